//! Reward proxies for the adaptive strategy
//!
//! The true value of a label is unobservable without held-out ground truth, so
//! the adaptive strategy scores a cheap proxy before and after committing the
//! label and turns the pair into a reward in `[0, 1]`. Which proxy to use is a
//! modelling choice; all of them sit behind [`RewardProxy`].
//!
//! | Proxy | Reference | Reward |
//! |-------|-----------|--------|
//! | `accuracy_delta` | labeled subsample | accuracy change, mapped from `[-1, 1]` |
//! | `confidence_delta` | unlabeled subsample | mean top-class probability change |
//! | `importance_weighted_accuracy` | queried instances | accuracy weighted by `1 / P` at query time |
//! | `class_balance` | none, model-free | rarity of the returned label |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::ModelError;
use crate::model::{Model, accuracy, top_probability};
use crate::types::{InstanceId, Label};

/// Which instances a proxy scores the model on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePool {
    Labeled,
    Unlabeled,
    None,
}

/// Everything a proxy may look at when scoring
pub struct RewardContext<'a> {
    pub dataset: &'a Dataset,
    pub model: Option<&'a dyn Model>,
    /// Reference subsample drawn when the query was proposed
    pub reference: &'a [InstanceId],
    /// Queried instances and their selection probabilities, oldest first
    pub queried: &'a [(InstanceId, f64)],
    pub query: InstanceId,
    /// The committed label; `None` while scoring the baseline
    pub label: Option<Label>,
}

/// Estimates how much a label helped.
///
/// `score` is called once before the label commits (`label == None`) and once
/// after the reward model has been retrained; `reward` combines the two.
pub trait RewardProxy: Send + fmt::Debug {
    fn name(&self) -> &'static str;

    fn requires_model(&self) -> bool {
        true
    }

    fn reference_pool(&self) -> ReferencePool;

    /// `Ok(None)` when nothing can be scored yet
    fn score(&self, ctx: &RewardContext<'_>) -> Result<Option<f64>, ModelError>;

    /// Reward in `[0, 1]` from the baseline and post-commit scores
    fn reward(&self, before: Option<f64>, after: Option<f64>) -> f64 {
        delta_reward(before, after)
    }
}

/// Maps a score change in `[-1, 1]` onto `[0, 1]`; 0 when either side is missing
pub fn delta_reward(before: Option<f64>, after: Option<f64>) -> f64 {
    match (before, after) {
        (Some(before), Some(after)) => ((after - before).clamp(-1.0, 1.0) + 1.0) / 2.0,
        _ => 0.0,
    }
}

/// Built-in proxies, selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    AccuracyDelta,
    ConfidenceDelta,
    ImportanceWeightedAccuracy,
    ClassBalance,
}

impl RewardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccuracyDelta => "accuracy_delta",
            Self::ConfidenceDelta => "confidence_delta",
            Self::ImportanceWeightedAccuracy => "importance_weighted_accuracy",
            Self::ClassBalance => "class_balance",
        }
    }

    pub fn all() -> &'static [RewardKind] {
        &[
            Self::AccuracyDelta,
            Self::ConfidenceDelta,
            Self::ImportanceWeightedAccuracy,
            Self::ClassBalance,
        ]
    }

    pub fn proxy(&self) -> Box<dyn RewardProxy> {
        match self {
            Self::AccuracyDelta => Box::new(AccuracyDelta),
            Self::ConfidenceDelta => Box::new(ConfidenceDelta),
            Self::ImportanceWeightedAccuracy => Box::new(ImportanceWeightedAccuracy),
            Self::ClassBalance => Box::new(ClassBalance),
        }
    }
}

impl fmt::Display for RewardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewardKind {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| crate::error::ConfigError::UnknownRewardProxy(s.to_string()))
    }
}

/// Accuracy on a labeled reference subsample, before vs. after
#[derive(Debug, Clone, Copy, Default)]
pub struct AccuracyDelta;

impl RewardProxy for AccuracyDelta {
    fn name(&self) -> &'static str {
        RewardKind::AccuracyDelta.as_str()
    }

    fn reference_pool(&self) -> ReferencePool {
        ReferencePool::Labeled
    }

    fn score(&self, ctx: &RewardContext<'_>) -> Result<Option<f64>, ModelError> {
        let Some(model) = ctx.model else {
            return Ok(None);
        };
        let samples = ctx.reference.iter().filter_map(|id| {
            let features = ctx.dataset.get(*id)?;
            let label = ctx.dataset.label(*id)?;
            Some((features.as_ref(), label))
        });
        accuracy(model, samples)
    }
}

/// Mean top-class probability on an unlabeled reference subsample
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceDelta;

impl RewardProxy for ConfidenceDelta {
    fn name(&self) -> &'static str {
        RewardKind::ConfidenceDelta.as_str()
    }

    fn reference_pool(&self) -> ReferencePool {
        ReferencePool::Unlabeled
    }

    fn score(&self, ctx: &RewardContext<'_>) -> Result<Option<f64>, ModelError> {
        let Some(model) = ctx.model else {
            return Ok(None);
        };
        let mut total = 0.0;
        let mut count = 0usize;
        for id in ctx.reference {
            if let Some(features) = ctx.dataset.get(*id) {
                total += top_probability(&model.predict_proba(features)?);
                count += 1;
            }
        }
        Ok((count > 0).then(|| total / count as f64))
    }
}

/// Importance-weighted accuracy over every queried instance.
///
/// Each queried instance counts with weight `1 / P`, the inverse of the
/// probability its strategy was selected with. Only the post-commit score is
/// used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceWeightedAccuracy;

impl RewardProxy for ImportanceWeightedAccuracy {
    fn name(&self) -> &'static str {
        RewardKind::ImportanceWeightedAccuracy.as_str()
    }

    fn reference_pool(&self) -> ReferencePool {
        ReferencePool::None
    }

    fn score(&self, ctx: &RewardContext<'_>) -> Result<Option<f64>, ModelError> {
        let (Some(model), Some(_)) = (ctx.model, ctx.label) else {
            return Ok(None);
        };
        let mut weighted_correct = 0.0;
        let mut total_weight = 0.0;
        for (id, probability) in ctx.queried {
            let (Some(features), Some(label)) = (ctx.dataset.get(*id), ctx.dataset.label(*id))
            else {
                continue;
            };
            let weight = 1.0 / probability;
            total_weight += weight;
            if model.predict(features)? == label {
                weighted_correct += weight;
            }
        }
        Ok((total_weight > 0.0).then(|| weighted_correct / total_weight))
    }

    fn reward(&self, _before: Option<f64>, after: Option<f64>) -> f64 {
        after.unwrap_or(0.0)
    }
}

/// Model-free: rewards labels that are rare among those already collected
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassBalance;

impl RewardProxy for ClassBalance {
    fn name(&self) -> &'static str {
        RewardKind::ClassBalance.as_str()
    }

    fn requires_model(&self) -> bool {
        false
    }

    fn reference_pool(&self) -> ReferencePool {
        ReferencePool::None
    }

    fn score(&self, ctx: &RewardContext<'_>) -> Result<Option<f64>, ModelError> {
        let Some(label) = ctx.label else {
            return Ok(None);
        };
        let mut others = 0usize;
        let mut same = 0usize;
        for (id, _, existing) in ctx.dataset.get_labeled() {
            if id == ctx.query {
                continue;
            }
            others += 1;
            if existing == label {
                same += 1;
            }
        }
        if others == 0 {
            return Ok(Some(1.0));
        }
        Ok(Some(1.0 - same as f64 / others as f64))
    }

    fn reward(&self, _before: Option<f64>, after: Option<f64>) -> f64 {
        after.unwrap_or(0.0)
    }
}
