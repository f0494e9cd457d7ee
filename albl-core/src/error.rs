//! Error types for albl-core

use thiserror::Error;

use crate::types::{InstanceId, Label};

/// Errors raised by [`Dataset`](crate::Dataset) operations
#[derive(Debug, Error)]
pub enum DatasetError {
    /// No instance with this id exists
    #[error("Invalid instance id: {0}")]
    InvalidId(InstanceId),

    /// The instance already carries a label
    #[error("Instance {id} is already labeled ({existing}), refusing to label it {attempted}")]
    AlreadyLabeled {
        id: InstanceId,
        existing: Label,
        attempted: Label,
    },

    /// The label committed but one or more observers failed
    #[error("Label for instance {id} committed, but {} observer(s) failed: {}", .failures.len(), .failures.join("; "))]
    Observer { id: InstanceId, failures: Vec<String> },
}

/// Error returned by a dataset observer callback
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised by [`Model`](crate::Model) implementations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The model has not been trained yet
    #[error("Model has not been trained")]
    Untrained,

    /// Training was requested with no labeled instances
    #[error("Cannot train on an empty labeled set")]
    EmptyTrainingSet,

    /// Feature vector length does not match the training data
    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Implementation-specific failure
    #[error("Model error: {0}")]
    Other(String),
}

/// Errors raised by an [`Oracle`](crate::Oracle)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// The oracle has no knowledge of this instance
    #[error("Unknown instance: {0}")]
    UnknownInstance(InstanceId),

    /// The oracle declined to label the instance
    #[error("Labeling of instance {id} refused: {reason}")]
    Refused { id: InstanceId, reason: String },
}

/// Errors raised by query strategies
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    /// No unlabeled instance remains
    #[error("Unlabeled pool is exhausted")]
    ExhaustedPool,

    /// The strategy was asked to query a dataset it was not built for
    #[error("Strategy was built for dataset {expected}, got {actual}")]
    DatasetMismatch {
        expected: uuid::Uuid,
        actual: uuid::Uuid,
    },

    /// A base strategy proposed an id that is unknown or already labeled
    #[error("Strategy '{strategy}' proposed instance {id}, which is not in the unlabeled pool")]
    InvalidProposal { strategy: String, id: InstanceId },

    /// The strategy needs a native backend that is not installed
    #[error("Strategy '{name}' is not available: its native backend was not found.\n\n{hint}")]
    Unavailable { name: String, hint: String },

    /// The named strategy exists but no factory has been registered for it
    #[error("Strategy '{0}' is available but no implementation is registered")]
    NotRegistered(String),

    /// The strategy name could not be resolved
    #[error("Unknown strategy: {0}")]
    Unknown(String),

    /// A model used by the strategy failed
    #[error("Model failure in strategy: {0}")]
    Model(#[from] ModelError),

    /// Strategy-specific failure
    #[error("Strategy '{strategy}' failed: {reason}")]
    Failed { strategy: String, reason: String },
}

/// Invalid construction-time configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The exploration floor must lie in (0, 1/K)
    #[error("Exploration floor must be in (0, {max}), got {value}")]
    InvalidExplorationFloor { value: f64, max: f64 },

    /// At least one base strategy is required
    #[error("At least one base strategy is required")]
    NoStrategies,

    /// The reward proxy scores a model but none was supplied
    #[error("Reward proxy '{0}' requires a model")]
    MissingModel(&'static str),

    /// The reference subsample must contain at least one instance
    #[error("Reference size must be positive")]
    EmptyReference,

    /// Unknown reward proxy name
    #[error("Unknown reward proxy: {0}")]
    UnknownRewardProxy(String),
}

/// What went wrong during a learner round
#[derive(Debug, Error)]
pub enum RoundFailure {
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// The background training task panicked or was cancelled
    #[error("Training worker failed: {0}")]
    Worker(String),
}

/// A failed learner round, with the context needed to resume
#[derive(Debug, Error)]
#[error("Round {round} failed{}: {kind}", .instance.map(|id| format!(" on instance {id}")).unwrap_or_default())]
pub struct LearnerError {
    pub round: u64,
    pub instance: Option<InstanceId>,
    #[source]
    pub kind: RoundFailure,
}

impl LearnerError {
    pub fn new(round: u64, instance: Option<InstanceId>, kind: impl Into<RoundFailure>) -> Self {
        Self {
            round,
            instance,
            kind: kind.into(),
        }
    }

    /// True when the pool ran out of unlabeled instances
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, RoundFailure::Strategy(StrategyError::ExhaustedPool))
    }
}
