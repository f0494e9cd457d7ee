//! The shared instance pool
//!
//! A [`Dataset`] owns every instance. Strategies and models refer to instances
//! by [`InstanceId`] and read features through shared [`Features`] buffers, so a
//! committed label is visible to every consumer immediately.
//!
//! Labels only ever move an instance from the unlabeled view to the labeled
//! view. Observers registered with [`Dataset::on_update`] run synchronously
//! after each successful commit, in registration order.

use std::fmt;

use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DatasetError, ObserverError};
use crate::types::{Features, InstanceId, Label, LabelEvent, LabeledInstance};

/// How to treat a second label for an already labeled instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelabelPolicy {
    /// Any second label is an error
    #[default]
    Reject,
    /// A second label equal to the first is a no-op; a different one is an error
    AllowIdentical,
}

/// Dataset behaviour settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub relabel: RelabelPolicy,
}

type Observer = Box<dyn FnMut(&LabelEvent) -> Result<(), ObserverError> + Send>;

#[derive(Debug, Clone)]
struct Entry {
    features: Features,
    label: Option<Label>,
}

/// Pool of instances partitioned into labeled and unlabeled
pub struct Dataset {
    id: Uuid,
    entries: Vec<Entry>,
    labeled_count: usize,
    observers: Vec<Observer>,
    config: DatasetConfig,
}

impl Dataset {
    /// Build a dataset from `(features, label)` pairs; `None` marks an unlabeled instance
    pub fn new<I, F>(entries: I) -> Self
    where
        I: IntoIterator<Item = (F, Option<Label>)>,
        F: Into<Features>,
    {
        Self::with_config(entries, DatasetConfig::default())
    }

    /// Build a dataset with explicit configuration
    pub fn with_config<I, F>(entries: I, config: DatasetConfig) -> Self
    where
        I: IntoIterator<Item = (F, Option<Label>)>,
        F: Into<Features>,
    {
        let mut dataset = Self {
            id: Uuid::new_v4(),
            entries: Vec::new(),
            labeled_count: 0,
            observers: Vec::new(),
            config,
        };
        for (features, label) in entries {
            dataset.push(features, label);
        }
        dataset
    }

    /// Append an instance and return its id
    pub fn push(&mut self, features: impl Into<Features>, label: Option<Label>) -> InstanceId {
        let id = InstanceId(self.entries.len());
        if label.is_some() {
            self.labeled_count += 1;
        }
        self.entries.push(Entry {
            features: features.into(),
            label,
        });
        id
    }

    /// Identity of this dataset, fixed at construction
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len_labeled(&self) -> usize {
        self.labeled_count
    }

    pub fn len_unlabeled(&self) -> usize {
        self.entries.len() - self.labeled_count
    }

    /// Features of an instance
    pub fn get(&self, id: InstanceId) -> Option<&Features> {
        self.entries.get(id.0).map(|e| &e.features)
    }

    /// Label of an instance, `None` if unknown or unlabeled
    pub fn label(&self, id: InstanceId) -> Option<Label> {
        self.entries.get(id.0).and_then(|e| e.label)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        id.0 < self.entries.len()
    }

    pub fn is_labeled(&self, id: InstanceId) -> bool {
        self.label(id).is_some()
    }

    /// Unlabeled instances in id order, reflecting the state at call time
    pub fn get_unlabeled(&self) -> impl Iterator<Item = (InstanceId, &Features)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.label.is_none())
            .map(|(i, e)| (InstanceId(i), &e.features))
    }

    /// Labeled instances in id order
    pub fn get_labeled(&self) -> impl Iterator<Item = (InstanceId, &Features, Label)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.label.map(|label| (InstanceId(i), &e.features, label)))
    }

    pub fn unlabeled_ids(&self) -> Vec<InstanceId> {
        self.get_unlabeled().map(|(id, _)| id).collect()
    }

    pub fn labeled_ids(&self) -> Vec<InstanceId> {
        self.get_labeled().map(|(id, _, _)| id).collect()
    }

    /// Owned view of the labeled set for training off the caller's thread.
    ///
    /// Feature buffers are shared with the dataset, not copied.
    pub fn labeled_snapshot(&self) -> Vec<LabeledInstance> {
        self.get_labeled()
            .map(|(id, features, label)| LabeledInstance {
                id,
                features: features.clone(),
                label,
            })
            .collect()
    }

    /// Uniform sample of labeled ids without replacement
    pub fn sample_labeled<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Vec<InstanceId> {
        sample_ids(self.labeled_ids(), size, rng)
    }

    /// Uniform sample of unlabeled ids without replacement
    pub fn sample_unlabeled<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Vec<InstanceId> {
        sample_ids(self.unlabeled_ids(), size, rng)
    }

    /// Register a callback run after every committed label
    pub fn on_update<F>(&mut self, observer: F)
    where
        F: FnMut(&LabelEvent) -> Result<(), ObserverError> + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Label an unlabeled instance.
    ///
    /// Returns the event for a new label, or `None` when an identical relabel
    /// was accepted as a no-op under [`RelabelPolicy::AllowIdentical`]; no-ops
    /// reach no observer. The label is committed before observers run;
    /// observer failures are reported through [`DatasetError::Observer`]
    /// without undoing the commit.
    pub fn update(
        &mut self,
        id: InstanceId,
        label: Label,
    ) -> Result<Option<LabelEvent>, DatasetError> {
        let entry = self
            .entries
            .get_mut(id.0)
            .ok_or(DatasetError::InvalidId(id))?;

        if let Some(existing) = entry.label {
            if existing == label && self.config.relabel == RelabelPolicy::AllowIdentical {
                debug!(%id, %label, "identical relabel ignored");
                return Ok(None);
            }
            return Err(DatasetError::AlreadyLabeled {
                id,
                existing,
                attempted: label,
            });
        }

        entry.label = Some(label);
        self.labeled_count += 1;
        debug!(%id, %label, labeled = self.labeled_count, "instance labeled");

        let event = LabelEvent::new(id, label);
        let failures: Vec<String> = self
            .observers
            .iter_mut()
            .filter_map(|observer| observer(&event).err())
            .map(|e| e.to_string())
            .collect();

        if failures.is_empty() {
            Ok(Some(event))
        } else {
            warn!(%id, count = failures.len(), "dataset observers failed");
            Err(DatasetError::Observer { id, failures })
        }
    }
}

fn sample_ids<R: Rng + ?Sized>(ids: Vec<InstanceId>, size: usize, rng: &mut R) -> Vec<InstanceId> {
    if size >= ids.len() {
        return ids;
    }
    let mut picked: Vec<InstanceId> = index::sample(rng, ids.len(), size)
        .into_iter()
        .map(|i| ids[i])
        .collect();
    picked.sort_unstable();
    picked
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("id", &self.id)
            .field("len", &self.entries.len())
            .field("labeled", &self.labeled_count)
            .field("observers", &self.observers.len())
            .field("config", &self.config)
            .finish()
    }
}
