//! Shared identifier and value types

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of an instance, assigned at insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub usize);

impl InstanceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for InstanceId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

/// Class label produced by an oracle or a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(pub i64);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Feature vector, shared between the dataset and its consumers
pub type Features = Arc<[f64]>;

/// A labeled instance as handed to [`Model::train`](crate::Model::train)
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledInstance {
    pub id: InstanceId,
    pub features: Features,
    pub label: Label,
}

/// Emitted once per committed label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEvent {
    pub id: InstanceId,
    pub label: Label,
    pub labeled_at: DateTime<Utc>,
}

impl LabelEvent {
    pub fn new(id: InstanceId, label: Label) -> Self {
        Self {
            id,
            label,
            labeled_at: Utc::now(),
        }
    }
}
