//! Label sources

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::OracleError;
use crate::types::{Features, InstanceId, Label};

/// Supplies a label for a requested instance.
///
/// May be a human behind a prompt, a lookup table or a simulation against
/// known ground truth.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn label(&self, id: InstanceId, features: &Features) -> Result<Label, OracleError>;
}

/// Oracle backed by ground-truth labels known in advance
#[derive(Debug, Clone, Default)]
pub struct IdealLabeler {
    truth: HashMap<InstanceId, Label>,
}

impl IdealLabeler {
    pub fn new(truth: HashMap<InstanceId, Label>) -> Self {
        Self { truth }
    }

    /// Ground truth given in instance id order
    pub fn from_labels(labels: impl IntoIterator<Item = Label>) -> Self {
        Self {
            truth: labels
                .into_iter()
                .enumerate()
                .map(|(i, label)| (InstanceId(i), label))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.truth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.truth.is_empty()
    }
}

#[async_trait]
impl Oracle for IdealLabeler {
    async fn label(&self, id: InstanceId, _features: &Features) -> Result<Label, OracleError> {
        self.truth
            .get(&id)
            .copied()
            .ok_or(OracleError::UnknownInstance(id))
    }
}
