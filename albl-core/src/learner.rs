//! Async round driver
//!
//! One round: ask the strategy for a query, ask the oracle for its label,
//! commit it to the dataset, notify the strategy, then retrain the learner
//! model on the blocking pool. Rounds never overlap; retraining is awaited
//! before `run_round` returns.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::error::{DatasetError, LearnerError, ModelError, RoundFailure, StrategyError};
use crate::model::Model;
use crate::oracle::Oracle;
use crate::strategy::QueryStrategy;
use crate::types::{InstanceId, Label, LabelEvent};

/// Result of a completed round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: u64,
    pub instance: InstanceId,
    pub label: Label,
    pub labeled: usize,
    pub unlabeled: usize,
    /// Whether the learner model holds a fit after this round
    pub model_trained: bool,
}

/// Owns the pool, a strategy, an oracle and an optional learner model
pub struct ActiveLearner<S, O> {
    dataset: Dataset,
    strategy: S,
    oracle: O,
    model: Option<Box<dyn Model>>,
    round: u64,
}

impl<S, O> ActiveLearner<S, O>
where
    S: QueryStrategy,
    O: Oracle,
{
    pub fn new(dataset: Dataset, strategy: S, oracle: O) -> Self {
        Self {
            dataset,
            strategy,
            oracle,
            model: None,
            round: 0,
        }
    }

    /// Learner model retrained after every committed label
    pub fn with_model(mut self, model: impl Model + 'static) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    pub fn with_boxed_model(mut self, model: Box<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Mutable access, e.g. to register observers
    pub fn dataset_mut(&mut self) -> &mut Dataset {
        &mut self.dataset
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn model(&self) -> Option<&dyn Model> {
        self.model.as_deref()
    }

    /// Rounds that committed a label
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn into_parts(self) -> (Dataset, S, Option<Box<dyn Model>>) {
        (self.dataset, self.strategy, self.model)
    }

    /// Run one query-label-retrain round
    pub async fn run_round(&mut self) -> Result<RoundOutcome, LearnerError> {
        let round = self.round;
        let fail = |instance, kind: RoundFailure| LearnerError::new(round, instance, kind);

        let id = self
            .strategy
            .propose_query(&self.dataset)
            .map_err(|e| fail(None, e.into()))?;
        let invalid = |strategy: &S| {
            fail(
                Some(id),
                StrategyError::InvalidProposal {
                    strategy: strategy.name().to_string(),
                    id,
                }
                .into(),
            )
        };
        if self.dataset.is_labeled(id) {
            return Err(invalid(&self.strategy));
        }
        let features = self
            .dataset
            .get(id)
            .cloned()
            .ok_or_else(|| invalid(&self.strategy))?;
        debug!(round, instance = %id, strategy = %self.strategy.name(), "querying oracle");

        let label = self
            .oracle
            .label(id, &features)
            .await
            .map_err(|e| fail(Some(id), e.into()))?;

        // From here the label is committed, so the remaining steps always run
        // and the first failure is reported once they are done.
        let mut deferred: Option<RoundFailure> = None;
        let event = match self.dataset.update(id, label) {
            Ok(Some(event)) => event,
            Ok(None) => return Err(invalid(&self.strategy)),
            Err(e @ DatasetError::Observer { .. }) => {
                warn!(round, instance = %id, error = %e, "label committed with observer failures");
                deferred = Some(e.into());
                LabelEvent::new(id, label)
            }
            Err(e) => return Err(fail(Some(id), e.into())),
        };
        self.round += 1;

        if let Err(e) = self.strategy.notify(&self.dataset, &event) {
            warn!(round, instance = %id, error = %e, "strategy notify failed");
            deferred.get_or_insert(e.into());
        }

        let model_trained = match self.retrain().await {
            Ok(trained) => trained,
            Err(e) => {
                warn!(round, error = %e, "learner model retraining failed");
                deferred.get_or_insert(e);
                false
            }
        };

        if let Some(kind) = deferred {
            return Err(fail(Some(id), kind));
        }

        info!(
            round,
            instance = %id,
            %label,
            labeled = self.dataset.len_labeled(),
            unlabeled = self.dataset.len_unlabeled(),
            "round complete"
        );
        Ok(RoundOutcome {
            round,
            instance: id,
            label,
            labeled: self.dataset.len_labeled(),
            unlabeled: self.dataset.len_unlabeled(),
            model_trained,
        })
    }

    /// Run up to `budget` rounds, stopping early when the pool is exhausted
    pub async fn run(&mut self, budget: usize) -> Result<Vec<RoundOutcome>, LearnerError> {
        let mut outcomes = Vec::with_capacity(budget);
        for _ in 0..budget {
            match self.run_round().await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if e.is_exhausted() => {
                    info!(rounds = outcomes.len(), "unlabeled pool exhausted");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    /// Fit the learner model on the blocking pool; `Ok(false)` when there is no model
    async fn retrain(&mut self) -> Result<bool, RoundFailure> {
        let Some(mut model) = self.model.take() else {
            return Ok(false);
        };
        let snapshot = self.dataset.labeled_snapshot();
        let (model, result) = tokio::task::spawn_blocking(move || {
            let result = model.train(&snapshot);
            (model, result)
        })
        .await
        .map_err(|e| RoundFailure::Worker(e.to_string()))?;
        self.model = Some(model);

        match result {
            Ok(()) => Ok(true),
            Err(ModelError::EmptyTrainingSet) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
