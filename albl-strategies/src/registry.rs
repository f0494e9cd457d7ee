//! Name-based strategy construction
//!
//! Strategy specs are `name` or `name:argument`, e.g. `random` or
//! `uncertainty:entropy`. Optional native strategies are checked against
//! [`OptionalFeatures`] before any factory runs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use albl_core::{Model, OptionalFeature, OptionalFeatures, QueryStrategy, StrategyError, install_hint};
use tracing::{debug, warn};

use crate::random::RandomSampling;
use crate::unavailable::UnavailableStrategy;
use crate::uncertainty::{UncertaintyMethod, UncertaintySampling};

/// Creates a fresh, untrained model for a strategy that needs one
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn Model> + Send + Sync>;

/// Builds a strategy from a parsed spec
pub type StrategyFactory =
    Box<dyn Fn(&BuildContext<'_>) -> Result<Box<dyn QueryStrategy>, StrategyError> + Send + Sync>;

/// What a factory gets to work with
pub struct BuildContext<'a> {
    pub name: &'a str,
    /// Text after the first `:`, e.g. `margin` in `uncertainty:margin`
    pub argument: Option<&'a str>,
    pub seed: Option<u64>,
    model: Option<&'a ModelFactory>,
}

impl BuildContext<'_> {
    /// A new model from the registry's model factory
    pub fn new_model(&self) -> Result<Box<dyn Model>, StrategyError> {
        self.model
            .map(|factory| factory())
            .ok_or_else(|| StrategyError::Failed {
                strategy: self.name.to_string(),
                reason: "no model factory configured".into(),
            })
    }
}

/// Maps strategy specs to factories
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
    features: OptionalFeatures,
    model: Option<ModelFactory>,
    allow_unavailable: bool,
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new(features: OptionalFeatures) -> Self {
        Self {
            factories: BTreeMap::new(),
            features,
            model: None,
            allow_unavailable: false,
        }
    }

    /// Registry with `random` and `uncertainty` registered
    pub fn with_defaults(features: OptionalFeatures) -> Self {
        let mut registry = Self::new(features);
        registry.register("random", |ctx| {
            let strategy = match ctx.seed {
                Some(seed) => RandomSampling::with_seed(seed),
                None => RandomSampling::new(),
            };
            Ok(Box::new(strategy))
        });
        registry.register("uncertainty", |ctx| {
            let method = match ctx.argument {
                Some(arg) => arg.parse()?,
                None => UncertaintyMethod::default(),
            };
            Ok(Box::new(UncertaintySampling::boxed(ctx.new_model()?, method)))
        });
        registry
    }

    /// Model factory handed to strategies that train their own model
    pub fn with_model_factory(
        mut self,
        factory: impl Fn() -> Box<dyn Model> + Send + Sync + 'static,
    ) -> Self {
        self.model = Some(Arc::new(factory));
        self
    }

    /// Build placeholders instead of failing for missing optional strategies
    pub fn allow_unavailable(mut self, allow: bool) -> Self {
        self.allow_unavailable = allow;
        self
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&BuildContext<'_>) -> Result<Box<dyn QueryStrategy>, StrategyError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn features(&self) -> &OptionalFeatures {
        &self.features
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build one strategy from its spec
    pub fn build(&self, spec: &str, seed: Option<u64>) -> Result<Box<dyn QueryStrategy>, StrategyError> {
        let (name, argument) = match spec.split_once(':') {
            Some((name, argument)) => (name, Some(argument)),
            None => (spec, None),
        };

        if let Ok(feature) = name.parse::<OptionalFeature>()
            && !self.features.is_available(feature)
        {
            if self.allow_unavailable {
                warn!(strategy = name, "native backend missing, using placeholder");
                return Ok(Box::new(UnavailableStrategy::new(feature)));
            }
            return Err(StrategyError::Unavailable {
                name: name.to_string(),
                hint: install_hint(),
            });
        }

        let Some(factory) = self.factories.get(name) else {
            if name.parse::<OptionalFeature>().is_ok() {
                return Err(StrategyError::NotRegistered(name.to_string()));
            }
            return Err(StrategyError::Unknown(spec.to_string()));
        };

        let ctx = BuildContext {
            name,
            argument,
            seed,
            model: self.model.as_ref(),
        };
        let strategy = factory(&ctx)?;
        debug!(spec, strategy = %strategy.name(), "strategy built");
        Ok(strategy)
    }

    /// Build several strategies; seeded strategies get distinct derived seeds
    pub fn build_all<S: AsRef<str>>(
        &self,
        specs: &[S],
        seed: Option<u64>,
    ) -> Result<Vec<Box<dyn QueryStrategy>>, StrategyError> {
        specs
            .iter()
            .enumerate()
            .map(|(i, spec)| self.build(spec.as_ref(), seed.map(|s| s.wrapping_add(i as u64 + 1))))
            .collect()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.factories.keys().collect::<Vec<_>>())
            .field("features", &self.features)
            .field("has_model_factory", &self.model.is_some())
            .field("allow_unavailable", &self.allow_unavailable)
            .finish()
    }
}
