pub mod config;
pub mod features;
pub mod label;
pub mod simulate;

use albl_core::{AdaptiveStrategy, Dataset, OptionalFeatures};
use albl_strategies::StrategyRegistry;
use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::AlblConfig;

/// Adaptive strategy over the configured base strategies, for `dataset`
pub fn adaptive_strategy(config: &AlblConfig, dataset: &Dataset) -> Result<AdaptiveStrategy> {
    let kind = config.experiment.model;
    let registry = StrategyRegistry::with_defaults(OptionalFeatures::detect())
        .with_model_factory(move || kind.build())
        .allow_unavailable(config.experiment.allow_unavailable);

    let strategies = registry.build_all(&config.experiment.strategies, config.adaptive.seed)?;
    let strategy = AdaptiveStrategy::builder()
        .strategies(strategies)
        .config(config.adaptive.clone())
        .boxed_model(kind.build())
        .build(dataset)?;
    Ok(strategy)
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use albl_core::{Label, QueryStrategy};

    fn pool() -> Dataset {
        Dataset::new((0..8).map(|i| {
            let label = (i < 2).then_some(Label(i as i64));
            (vec![i as f64], label)
        }))
    }

    #[test]
    fn test_default_config_builds_three_arms() {
        let mut config = AlblConfig::default();
        config.adaptive.seed = Some(4);
        let strategy = adaptive_strategy(&config, &pool()).unwrap();
        assert_eq!(strategy.strategy_count(), 3);
        assert_eq!(strategy.reward_proxy(), "accuracy_delta");
        assert_eq!(strategy.name(), "adaptive");
    }

    #[test]
    fn test_unknown_strategy_is_reported() {
        let mut config = AlblConfig::default();
        config.experiment.strategies = vec!["random".into(), "clairvoyance".into()];
        let err = adaptive_strategy(&config, &pool()).unwrap_err();
        assert!(err.to_string().contains("clairvoyance"));
    }

    #[test]
    fn test_floor_too_large_for_arm_count() {
        let mut config = AlblConfig::default();
        config.adaptive.exploration_floor = 0.5;
        assert!(adaptive_strategy(&config, &pool()).is_err());
    }

    #[test]
    fn test_seeded_rng_repeats() {
        use rand::Rng;
        let a: u64 = seeded_rng(Some(9)).r#gen();
        let b: u64 = seeded_rng(Some(9)).r#gen();
        assert_eq!(a, b);
    }
}
