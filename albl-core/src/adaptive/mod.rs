//! Adaptive meta-strategy
//!
//! Chooses among base query strategies with an Exp3-style adversarial bandit.
//! Each round one strategy is drawn from the exploration-floored weight
//! distribution and asked for a query. Once the label commits, a reward proxy
//! estimates how much the label helped, the reward is divided by the selection
//! probability, and only the chosen strategy's weight grows by
//! `exp(p_min * r_hat / K)`.
//!
//! Only the chosen strategy's query is ever observed, so the importance
//! correction keeps the weight updates unbiased across strategies that are
//! selected at different rates.

mod history;
mod reward;
mod weights;

pub use history::{QueryHistory, QueryRecord, StrategySummary};
pub use reward::{
    AccuracyDelta, ClassBalance, ConfidenceDelta, ImportanceWeightedAccuracy, ReferencePool,
    RewardContext, RewardKind, RewardProxy, delta_reward,
};
pub use weights::{ExplorationWeights, importance_weighted};

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AdaptiveConfig;
use crate::dataset::Dataset;
use crate::error::{ConfigError, ModelError, StrategyError};
use crate::model::Model;
use crate::strategy::QueryStrategy;
use crate::types::{InstanceId, Label, LabelEvent};

/// Query proposed by a base strategy, awaiting its label
#[derive(Debug, Clone)]
struct PendingQuery {
    arm: usize,
    probability: f64,
    instance: InstanceId,
    baseline: Option<f64>,
    reference: Vec<InstanceId>,
}

/// Bandit over base strategies; itself a [`QueryStrategy`]
pub struct AdaptiveStrategy {
    dataset_id: Uuid,
    strategies: Vec<Box<dyn QueryStrategy>>,
    weights: ExplorationWeights,
    proxy: Box<dyn RewardProxy>,
    model: Option<Box<dyn Model>>,
    reference_size: usize,
    rng: StdRng,
    round: u64,
    pending: Option<PendingQuery>,
    history: QueryHistory,
}

/// Builder for [`AdaptiveStrategy`]
#[derive(Default)]
pub struct AdaptiveStrategyBuilder {
    strategies: Vec<Box<dyn QueryStrategy>>,
    config: AdaptiveConfig,
    model: Option<Box<dyn Model>>,
    proxy: Option<Box<dyn RewardProxy>>,
}

impl AdaptiveStrategyBuilder {
    /// Append a base strategy
    pub fn strategy(mut self, strategy: impl QueryStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Append already boxed base strategies
    pub fn strategies(mut self, strategies: impl IntoIterator<Item = Box<dyn QueryStrategy>>) -> Self {
        self.strategies.extend(strategies);
        self
    }

    pub fn config(mut self, config: AdaptiveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn exploration_floor(mut self, floor: f64) -> Self {
        self.config.exploration_floor = floor;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Model scored by the reward proxy; trained on the labeled set as rounds complete
    pub fn model(mut self, model: impl Model + 'static) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    pub fn boxed_model(mut self, model: Box<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    /// Custom reward proxy; overrides `config.reward`
    pub fn reward_proxy(mut self, proxy: impl RewardProxy + 'static) -> Self {
        self.proxy = Some(Box::new(proxy));
        self
    }

    /// Validate the configuration and bind the strategy to `dataset`
    pub fn build(self, dataset: &Dataset) -> Result<AdaptiveStrategy, ConfigError> {
        let arms = self.strategies.len();
        if arms == 0 {
            return Err(ConfigError::NoStrategies);
        }

        let floor = self.config.exploration_floor;
        let max = 1.0 / arms as f64;
        if !(floor > 0.0 && floor < max) {
            return Err(ConfigError::InvalidExplorationFloor { value: floor, max });
        }
        if self.config.reference_size == 0 {
            return Err(ConfigError::EmptyReference);
        }

        let proxy = match (self.proxy, self.config.reward) {
            (Some(proxy), _) => proxy,
            (None, Some(kind)) => kind.proxy(),
            (None, None) if self.model.is_some() => RewardKind::AccuracyDelta.proxy(),
            (None, None) => RewardKind::ClassBalance.proxy(),
        };
        if proxy.requires_model() && self.model.is_none() {
            return Err(ConfigError::MissingModel(proxy.name()));
        }

        let mut model = self.model;
        if let Some(model) = model.as_mut() {
            retrain(model.as_mut(), dataset);
        }

        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        debug!(
            strategies = arms,
            floor,
            proxy = proxy.name(),
            "adaptive strategy built"
        );

        Ok(AdaptiveStrategy {
            dataset_id: dataset.id(),
            strategies: self.strategies,
            weights: ExplorationWeights::uniform(arms, floor),
            proxy,
            model,
            reference_size: self.config.reference_size,
            rng,
            round: 0,
            pending: None,
            history: QueryHistory::new(),
        })
    }
}

impl AdaptiveStrategy {
    pub fn builder() -> AdaptiveStrategyBuilder {
        AdaptiveStrategyBuilder::default()
    }

    /// Completed rounds
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn exploration_floor(&self) -> f64 {
        self.weights.floor()
    }

    /// Raw weights; these only grow, so very long runs should read
    /// [`log_weights`](Self::log_weights) instead
    pub fn weights(&self) -> Vec<f64> {
        self.weights.weights()
    }

    pub fn log_weights(&self) -> &[f64] {
        self.weights.log_weights()
    }

    /// Current selection distribution over base strategies
    pub fn probabilities(&self) -> Vec<f64> {
        self.weights.probabilities()
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    pub fn reward_proxy(&self) -> &str {
        self.proxy.name()
    }

    /// Instance proposed by the last `propose_query` and not yet labeled
    pub fn pending_instance(&self) -> Option<InstanceId> {
        self.pending.as_ref().map(|p| p.instance)
    }

    pub fn summaries(&self) -> Vec<StrategySummary> {
        self.history
            .summarize(&self.strategy_names(), &self.probabilities())
    }

    fn draw_reference(&mut self, dataset: &Dataset, query: InstanceId) -> Vec<InstanceId> {
        let mut reference = match self.proxy.reference_pool() {
            ReferencePool::Labeled => dataset.sample_labeled(self.reference_size, &mut self.rng),
            // One extra so the query itself can be dropped
            ReferencePool::Unlabeled => {
                dataset.sample_unlabeled(self.reference_size + 1, &mut self.rng)
            }
            ReferencePool::None => Vec::new(),
        };
        reference.retain(|id| *id != query);
        reference.truncate(self.reference_size);
        reference
    }

    fn score(
        &self,
        dataset: &Dataset,
        reference: &[InstanceId],
        queried: &[(InstanceId, f64)],
        query: InstanceId,
        label: Option<Label>,
    ) -> Result<Option<f64>, ModelError> {
        let ctx = RewardContext {
            dataset,
            model: self.model.as_deref(),
            reference,
            queried,
            query,
            label,
        };
        match self.proxy.score(&ctx) {
            Err(ModelError::Untrained) => Ok(None),
            other => other,
        }
    }

    /// Reward the strategy behind `pending` now that its label is in
    fn commit(
        &mut self,
        dataset: &Dataset,
        event: &LabelEvent,
        pending: PendingQuery,
    ) -> Result<(), StrategyError> {
        if let Some(model) = self.model.as_mut() {
            retrain(model.as_mut(), dataset);
        }

        let mut queried: Vec<(InstanceId, f64)> = self.history.queried().collect();
        queried.push((pending.instance, pending.probability));
        let after = self.score(
            dataset,
            &pending.reference,
            &queried,
            event.id,
            Some(event.label),
        )?;

        let reward = self.proxy.reward(pending.baseline, after);
        let reward = if reward.is_finite() {
            reward.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let weighted_reward = importance_weighted(reward, pending.probability);
        self.weights.reward(pending.arm, weighted_reward);

        let strategy_name = self.strategies[pending.arm].name().to_string();
        debug!(
            round = self.round,
            strategy = %strategy_name,
            instance = %event.id,
            label = %event.label,
            reward,
            weighted_reward,
            "strategy rewarded"
        );

        self.history.push(QueryRecord {
            round: self.round,
            strategy: pending.arm,
            strategy_name,
            instance: event.id,
            label: event.label,
            probability: pending.probability,
            reward,
            weighted_reward,
            labeled_at: event.labeled_at,
        });
        self.round += 1;
        Ok(())
    }

    /// Refit the reward model on a label this strategy did not request and
    /// rebase the pending baseline on it
    fn absorb(&mut self, dataset: &Dataset, event: &LabelEvent) -> Result<(), StrategyError> {
        let Some(model) = self.model.as_mut() else {
            return Ok(());
        };
        retrain(model.as_mut(), dataset);
        debug!(instance = %event.id, "reward model refit on external label");

        if let Some(pending) = &self.pending {
            let baseline =
                self.score(dataset, &pending.reference, &[], pending.instance, None)?;
            if let Some(pending) = self.pending.as_mut() {
                pending.baseline = baseline;
            }
        }
        Ok(())
    }
}

/// Train on the current labeled set; an empty set leaves the model untrained
fn retrain(model: &mut dyn Model, dataset: &Dataset) {
    match model.train(&dataset.labeled_snapshot()) {
        Ok(()) => {}
        Err(ModelError::EmptyTrainingSet) => debug!("reward model waiting for labels"),
        Err(e) => warn!(error = %e, "reward model training failed"),
    }
}

impl QueryStrategy for AdaptiveStrategy {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn propose_query(&mut self, dataset: &Dataset) -> Result<InstanceId, StrategyError> {
        if dataset.id() != self.dataset_id {
            return Err(StrategyError::DatasetMismatch {
                expected: self.dataset_id,
                actual: dataset.id(),
            });
        }
        if dataset.len_unlabeled() == 0 {
            return Err(StrategyError::ExhaustedPool);
        }

        let (arm, probability) = self.weights.sample(&mut self.rng);
        let strategy = &mut self.strategies[arm];
        let instance = strategy.propose_query(dataset)?;
        if !dataset.contains(instance) || dataset.is_labeled(instance) {
            return Err(StrategyError::InvalidProposal {
                strategy: strategy.name().to_string(),
                id: instance,
            });
        }

        let reference = self.draw_reference(dataset, instance);
        let baseline = self.score(dataset, &reference, &[], instance, None)?;
        debug!(
            round = self.round,
            strategy = %self.strategies[arm].name(),
            probability,
            %instance,
            ?baseline,
            "query proposed"
        );

        if let Some(stale) = self.pending.replace(PendingQuery {
            arm,
            probability,
            instance,
            baseline,
            reference,
        }) {
            debug!(instance = %stale.instance, "abandoned unanswered query");
        }
        Ok(instance)
    }

    fn notify(&mut self, dataset: &Dataset, event: &LabelEvent) -> Result<(), StrategyError> {
        let committed = match self.pending.take_if(|p| p.instance == event.id) {
            Some(pending) => self.commit(dataset, event, pending),
            None => self.absorb(dataset, event),
        };

        let mut failures = Vec::new();
        for strategy in &mut self.strategies {
            if let Err(e) = strategy.notify(dataset, event) {
                warn!(strategy = %strategy.name(), error = %e, "base strategy notify failed");
                failures.push(format!("{}: {e}", strategy.name()));
            }
        }

        committed?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(StrategyError::Failed {
                strategy: self.name().to_string(),
                reason: failures.join("; "),
            })
        }
    }
}

impl fmt::Debug for AdaptiveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveStrategy")
            .field("strategies", &self.strategy_names())
            .field("weights", &self.weights)
            .field("proxy", &self.proxy.name())
            .field("round", &self.round)
            .field("pending", &self.pending_instance())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::{ConstantModel, SignModel};
    use crate::strategy::testing::{BrokenStrategy, FixedStrategy, RogueStrategy};

    fn pool(n: usize) -> Dataset {
        Dataset::new((0..n).map(|i| (vec![i as f64 - 4.5], None::<Label>)))
    }

    fn two_fixed(dataset: &Dataset, seed: u64) -> AdaptiveStrategy {
        AdaptiveStrategy::builder()
            .strategy(FixedStrategy::new("zero", 0))
            .strategy(FixedStrategy::new("one", 1))
            .exploration_floor(0.1)
            .seed(seed)
            .build(dataset)
            .unwrap()
    }

    fn label_round(strategy: &mut AdaptiveStrategy, dataset: &mut Dataset) -> InstanceId {
        let id = strategy.propose_query(dataset).unwrap();
        let label = Label((id.0 % 3) as i64);
        let event = dataset.update(id, label).unwrap().unwrap();
        strategy.notify(dataset, &event).unwrap();
        id
    }

    #[test]
    fn test_first_round_updates_only_chosen_weight() {
        let mut dataset = pool(10);
        let mut strategy = two_fixed(&dataset, 3);
        let before = strategy.weights();

        let id = label_round(&mut strategy, &mut dataset);

        assert!(id == InstanceId(0) || id == InstanceId(1));
        assert_eq!(dataset.len_labeled(), 1);
        assert_eq!(dataset.len_unlabeled(), 9);

        let record = strategy.history().last().unwrap().clone();
        let after = strategy.weights();
        let other = 1 - record.strategy;
        assert!(after[record.strategy] > before[record.strategy]);
        assert_eq!(after[other], before[other]);
        assert_eq!(strategy.round(), 1);
        // First label is always novel under the class balance proxy
        assert_eq!(record.reward, 1.0);
        assert!((record.weighted_reward - 1.0 / record.probability).abs() < 1e-12);
    }

    #[test]
    fn test_exhausted_pool_leaves_weights_untouched() {
        let mut dataset = Dataset::new(vec![(vec![0.0], Some(Label(0)))]);
        dataset.push(vec![1.0], None);
        let mut strategy = two_fixed(&dataset, 1);
        label_round(&mut strategy, &mut dataset);

        let weights = strategy.log_weights().to_vec();
        let round = strategy.round();
        let err = strategy.propose_query(&dataset).unwrap_err();

        assert_eq!(err, StrategyError::ExhaustedPool);
        assert_eq!(strategy.log_weights(), weights.as_slice());
        assert_eq!(strategy.round(), round);
        assert_eq!(strategy.pending_instance(), None);
    }

    #[test]
    fn test_weights_stay_positive_and_floored() {
        let mut dataset = pool(400);
        let mut strategy = AdaptiveStrategy::builder()
            .strategy(FixedStrategy::new("a", 0))
            .strategy(FixedStrategy::new("b", 1))
            .strategy(FixedStrategy::new("c", 2))
            .exploration_floor(0.3)
            .seed(17)
            .build(&dataset)
            .unwrap();

        for _ in 0..400 {
            label_round(&mut strategy, &mut dataset);
            assert!(strategy.log_weights().iter().all(|lw| lw.is_finite()));
            assert!(strategy.weights().iter().all(|w| *w > 0.0));
            for p in strategy.probabilities() {
                assert!(p >= 0.3 / 3.0 - 1e-12);
            }
        }
        assert_eq!(strategy.round(), 400);
        assert_eq!(
            strategy.propose_query(&dataset).unwrap_err(),
            StrategyError::ExhaustedPool
        );
    }

    #[test]
    fn test_same_seed_same_rounds() {
        let run = |seed| {
            let mut dataset = pool(30);
            let mut strategy = AdaptiveStrategy::builder()
                .strategy(FixedStrategy::new("low", 0))
                .strategy(FixedStrategy::new("high", 29))
                .strategy(FixedStrategy::new("mid", 15))
                .exploration_floor(0.2)
                .seed(seed)
                .build(&dataset)
                .unwrap();
            for _ in 0..20 {
                label_round(&mut strategy, &mut dataset);
            }
            strategy
                .history()
                .records()
                .iter()
                .map(|r| (r.strategy, r.instance, r.probability.to_bits()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_every_base_strategy_is_notified() {
        let mut dataset = pool(5);
        let zero = FixedStrategy::new("zero", 0);
        let one = FixedStrategy::new("one", 1);
        let (seen_zero, seen_one) = (zero.notified.clone(), one.notified.clone());
        let mut strategy = AdaptiveStrategy::builder()
            .strategy(zero)
            .strategy(one)
            .exploration_floor(0.1)
            .seed(8)
            .build(&dataset)
            .unwrap();

        let queried = label_round(&mut strategy, &mut dataset);
        // A label the meta-strategy did not ask for is still forwarded
        let event = dataset.update(InstanceId(4), Label(1)).unwrap().unwrap();
        strategy.notify(&dataset, &event).unwrap();

        for seen in [seen_zero, seen_one] {
            assert_eq!(*seen.lock().unwrap(), vec![queried, InstanceId(4)]);
        }
        assert_eq!(strategy.round(), 1);
    }

    #[test]
    fn test_delegated_failure_propagates_unchanged() {
        let dataset = pool(3);
        let mut strategy = AdaptiveStrategy::builder()
            .strategy(BrokenStrategy)
            .exploration_floor(0.5)
            .seed(0)
            .build(&dataset)
            .unwrap();
        let weights = strategy.log_weights().to_vec();

        let err = strategy.propose_query(&dataset).unwrap_err();
        assert_eq!(
            err,
            StrategyError::Failed {
                strategy: "broken".into(),
                reason: "scorer diverged".into(),
            }
        );
        assert_eq!(strategy.log_weights(), weights.as_slice());
    }

    #[test]
    fn test_labeled_proposal_is_rejected() {
        let mut dataset = pool(3);
        dataset.update(InstanceId(2), Label(0)).unwrap();
        let mut strategy = AdaptiveStrategy::builder()
            .strategy(RogueStrategy(InstanceId(2)))
            .exploration_floor(0.5)
            .build(&dataset)
            .unwrap();

        let err = strategy.propose_query(&dataset).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidProposal { id: InstanceId(2), .. }));
        assert_eq!(strategy.pending_instance(), None);
    }

    #[test]
    fn test_mismatched_dataset() {
        let dataset = pool(3);
        let other = pool(3);
        let mut strategy = two_fixed(&dataset, 0);
        let err = strategy.propose_query(&other).unwrap_err();
        assert!(matches!(err, StrategyError::DatasetMismatch { .. }));
    }

    #[test]
    fn test_configuration_errors() {
        let dataset = pool(3);

        let err = AdaptiveStrategy::builder().build(&dataset).unwrap_err();
        assert_eq!(err, ConfigError::NoStrategies);

        for floor in [0.0, 0.5, 0.9, f64::NAN, -0.1] {
            let err = AdaptiveStrategy::builder()
                .strategy(FixedStrategy::new("a", 0))
                .strategy(FixedStrategy::new("b", 1))
                .exploration_floor(floor)
                .build(&dataset)
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidExplorationFloor { .. }));
        }

        let err = AdaptiveStrategy::builder()
            .strategy(FixedStrategy::new("a", 0))
            .exploration_floor(0.1)
            .reward_proxy(AccuracyDelta)
            .build(&dataset)
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingModel("accuracy_delta"));

        let err = AdaptiveStrategy::builder()
            .strategy(FixedStrategy::new("a", 0))
            .config(AdaptiveConfig {
                reference_size: 0,
                ..AdaptiveConfig::default()
            })
            .build(&dataset)
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyReference);
    }

    #[test]
    fn test_model_defaults_to_accuracy_delta() {
        let mut dataset = Dataset::new(vec![
            (vec![2.0], Some(Label(1))),
            (vec![-2.0], Some(Label(0))),
            (vec![3.0], None),
            (vec![-3.0], None),
        ]);
        let mut strategy = AdaptiveStrategy::builder()
            .strategy(FixedStrategy::new("pos", 2))
            .strategy(FixedStrategy::new("neg", 3))
            .exploration_floor(0.2)
            .model(SignModel::default())
            .seed(4)
            .build(&dataset)
            .unwrap();
        assert_eq!(strategy.reward_proxy(), "accuracy_delta");

        let id = strategy.propose_query(&dataset).unwrap();
        let label = if id == InstanceId(2) { Label(1) } else { Label(0) };
        let event = dataset.update(id, label).unwrap().unwrap();
        strategy.notify(&dataset, &event).unwrap();

        // The sign model is already perfect, so accuracy does not move
        let record = strategy.history().last().unwrap();
        assert_eq!(record.reward, 0.5);
        assert!(record.weighted_reward > 0.5);
    }

    #[test]
    fn test_summaries_cover_every_strategy() {
        let mut dataset = pool(10);
        let mut strategy = two_fixed(&dataset, 12);
        for _ in 0..4 {
            label_round(&mut strategy, &mut dataset);
        }
        let summaries = strategy.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries.iter().map(|s| s.queries).sum::<usize>(), 4);
        let total: f64 = summaries.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    fn confidence_over_one_label(dataset: &mut Dataset) -> AdaptiveStrategy {
        dataset.update(InstanceId(0), Label(0)).unwrap();
        AdaptiveStrategy::builder()
            .strategy(FixedStrategy::new("one", 1))
            .strategy(FixedStrategy::new("two", 2))
            .exploration_floor(0.1)
            .model(ConstantModel::default())
            .reward_proxy(ConfidenceDelta)
            .seed(6)
            .build(dataset)
            .unwrap()
    }

    // Confidence of the constant model is n / (n + 1) after training on n labels:
    // the chosen strategy should only be credited with the move from 2 to 3 labels
    fn gain_from_two_to_three_labels() -> f64 {
        (1.0 + 3.0 / 4.0 - 2.0 / 3.0) / 2.0
    }

    #[test]
    fn test_external_label_refits_reward_model() {
        let mut dataset = pool(10);
        let mut strategy = confidence_over_one_label(&mut dataset);

        let event = dataset.update(InstanceId(5), Label(0)).unwrap().unwrap();
        strategy.notify(&dataset, &event).unwrap();
        assert_eq!(strategy.round(), 0);
        assert!(strategy.history().is_empty());

        label_round(&mut strategy, &mut dataset);

        let record = strategy.history().last().unwrap();
        assert!((record.reward - gain_from_two_to_three_labels()).abs() < 1e-12);
    }

    #[test]
    fn test_external_label_rebases_pending_query() {
        let mut dataset = pool(10);
        let mut strategy = confidence_over_one_label(&mut dataset);

        let id = strategy.propose_query(&dataset).unwrap();
        let event = dataset.update(InstanceId(7), Label(0)).unwrap().unwrap();
        strategy.notify(&dataset, &event).unwrap();
        assert_eq!(strategy.pending_instance(), Some(id));

        let event = dataset.update(id, Label(0)).unwrap().unwrap();
        strategy.notify(&dataset, &event).unwrap();

        let record = strategy.history().last().unwrap();
        assert_eq!(record.instance, id);
        assert!((record.reward - gain_from_two_to_three_labels()).abs() < 1e-12);
    }
}
