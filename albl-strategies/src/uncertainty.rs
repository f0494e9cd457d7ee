//! Uncertainty sampling
//!
//! Queries the unlabeled instance the strategy's own model is least sure
//! about. The model is refit lazily: `notify` marks it stale and the next
//! `propose_query` retrains on the current labeled set.

use std::fmt;
use std::str::FromStr;

use albl_core::{
    ClassProbabilities, Dataset, InstanceId, LabelEvent, Model, ModelError, QueryStrategy,
    StrategyError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How uncertainty is scored from a class distribution; higher is more uncertain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyMethod {
    /// `1 - max p`
    #[default]
    LeastConfident,
    /// `1 - (p1 - p2)` for the two most likely classes
    Margin,
    /// Shannon entropy of the distribution
    Entropy,
}

impl UncertaintyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeastConfident => "least_confident",
            Self::Margin => "margin",
            Self::Entropy => "entropy",
        }
    }

    pub fn all() -> &'static [UncertaintyMethod] {
        &[Self::LeastConfident, Self::Margin, Self::Entropy]
    }

    pub fn score(&self, probabilities: &ClassProbabilities) -> f64 {
        match self {
            Self::LeastConfident => {
                1.0 - probabilities.iter().map(|(_, p)| *p).fold(0.0, f64::max)
            }
            Self::Margin => {
                let mut sorted: Vec<f64> = probabilities.iter().map(|(_, p)| *p).collect();
                sorted.sort_by(|a, b| b.total_cmp(a));
                let first = sorted.first().copied().unwrap_or(0.0);
                let second = sorted.get(1).copied().unwrap_or(0.0);
                1.0 - (first - second)
            }
            Self::Entropy => probabilities
                .iter()
                .filter(|(_, p)| *p > 0.0)
                .map(|(_, p)| -p * p.ln())
                .sum(),
        }
    }
}

impl fmt::Display for UncertaintyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UncertaintyMethod {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| StrategyError::Unknown(format!("uncertainty:{s}")))
    }
}

/// Picks the unlabeled instance with the highest uncertainty score
pub struct UncertaintySampling {
    model: Box<dyn Model>,
    method: UncertaintyMethod,
    name: String,
    stale: bool,
}

impl UncertaintySampling {
    pub fn new(model: impl Model + 'static, method: UncertaintyMethod) -> Self {
        Self::boxed(Box::new(model), method)
    }

    pub fn boxed(model: Box<dyn Model>, method: UncertaintyMethod) -> Self {
        Self {
            model,
            method,
            name: format!("uncertainty:{method}"),
            stale: true,
        }
    }

    pub fn method(&self) -> UncertaintyMethod {
        self.method
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    fn refresh(&mut self, dataset: &Dataset) -> Result<(), ModelError> {
        if !self.stale {
            return Ok(());
        }
        match self.model.train(&dataset.labeled_snapshot()) {
            Ok(()) => {
                self.stale = false;
                Ok(())
            }
            // No labels yet: every candidate ties and the lowest id wins
            Err(ModelError::EmptyTrainingSet) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl QueryStrategy for UncertaintySampling {
    fn name(&self) -> &str {
        &self.name
    }

    fn propose_query(&mut self, dataset: &Dataset) -> Result<InstanceId, StrategyError> {
        self.refresh(dataset)?;

        let mut best: Option<(InstanceId, f64)> = None;
        for (id, features) in dataset.get_unlabeled() {
            let score = if self.model.is_trained() {
                self.method.score(&self.model.predict_proba(features)?)
            } else {
                0.0
            };
            // Strictly greater keeps the lowest id on ties
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((id, score));
            }
        }

        let (id, score) = best.ok_or(StrategyError::ExhaustedPool)?;
        debug!(strategy = %self.name, instance = %id, score, "most uncertain instance");
        Ok(id)
    }

    fn notify(&mut self, _dataset: &Dataset, _event: &LabelEvent) -> Result<(), StrategyError> {
        self.stale = true;
        Ok(())
    }
}

impl fmt::Debug for UncertaintySampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UncertaintySampling")
            .field("method", &self.method)
            .field("trained", &self.model.is_trained())
            .field("stale", &self.stale)
            .finish()
    }
}
