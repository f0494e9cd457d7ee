//! Registry-built strategies driven by the adaptive meta-strategy.

use albl_core::{
    ActiveLearner, AdaptiveStrategy, Dataset, IdealLabeler, InstanceId, Label, Model,
    OptionalFeatures, StrategyError,
};
use albl_models::NearestCentroid;
use albl_strategies::StrategyRegistry;

fn line_pool(n: usize) -> (Dataset, IdealLabeler) {
    let mut dataset = Dataset::new((0..n).map(|i| (vec![i as f64], None::<Label>)));
    dataset.update(InstanceId(0), Label(0)).unwrap();
    dataset.update(InstanceId(n - 1), Label(1)).unwrap();
    let truth = IdealLabeler::from_labels((0..n).map(|i| Label((i >= n / 2) as i64)));
    (dataset, truth)
}

fn registry() -> StrategyRegistry {
    StrategyRegistry::with_defaults(OptionalFeatures::none())
        .with_model_factory(|| Box::new(NearestCentroid::new()) as Box<dyn Model>)
}

#[tokio::test]
async fn test_adaptive_over_registry_strategies_labels_the_pool() {
    let (dataset, truth) = line_pool(16);
    let strategies = registry()
        .build_all(&["random", "uncertainty:margin", "uncertainty:entropy"], Some(4))
        .unwrap();
    let strategy = AdaptiveStrategy::builder()
        .strategies(strategies)
        .exploration_floor(0.15)
        .model(NearestCentroid::new())
        .seed(4)
        .build(&dataset)
        .unwrap();

    let mut learner =
        ActiveLearner::new(dataset, strategy, truth).with_model(NearestCentroid::new());
    let outcomes = learner.run(100).await.unwrap();

    assert_eq!(outcomes.len(), 14);
    assert_eq!(learner.dataset().len_unlabeled(), 0);
    let strategy = learner.strategy();
    assert_eq!(
        strategy.strategy_names(),
        vec!["random", "uncertainty:margin", "uncertainty:entropy"]
    );
    let summaries = strategy.summaries();
    assert_eq!(summaries.iter().map(|s| s.queries).sum::<usize>(), 14);
    assert!(strategy.probabilities().iter().all(|p| *p >= 0.15 / 3.0 - 1e-12));
}

#[tokio::test]
async fn test_placeholder_failure_surfaces_through_the_learner() {
    let (dataset, truth) = line_pool(4);
    let registry = registry().allow_unavailable(true);
    let strategy = AdaptiveStrategy::builder()
        .strategies(registry.build_all(&["hintsvm"], None).unwrap())
        .exploration_floor(0.5)
        .build(&dataset)
        .unwrap();

    let mut learner = ActiveLearner::new(dataset, strategy, truth);
    let err = learner.run_round().await.unwrap_err();

    assert_eq!(err.round, 0);
    assert!(err.to_string().contains("hintsvm"));
    assert!(!err.is_exhausted());
    assert!(matches!(
        err.kind,
        albl_core::RoundFailure::Strategy(StrategyError::Unavailable { .. })
    ));
}
