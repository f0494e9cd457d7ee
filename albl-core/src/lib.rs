//! albl-core - Pool-based active learning
//!
//! This crate provides the shared instance pool, the contracts for models,
//! oracles and query strategies, and the adaptive meta-strategy that learns
//! which base strategy to trust from the rewards its queries earn.

pub mod adaptive;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod learner;
pub mod model;
pub mod oracle;
pub mod strategy;
pub mod types;

pub use adaptive::{
    AdaptiveStrategy, AdaptiveStrategyBuilder, ExplorationWeights, QueryHistory, QueryRecord,
    RewardKind, RewardProxy, StrategySummary,
};
pub use config::AdaptiveConfig;
pub use dataset::{Dataset, DatasetConfig, RelabelPolicy};
pub use error::{
    ConfigError, DatasetError, LearnerError, ModelError, ObserverError, OracleError,
    RoundFailure, StrategyError,
};
pub use features::{OptionalFeature, OptionalFeatures, install_hint};
pub use learner::{ActiveLearner, RoundOutcome};
pub use model::{ClassProbabilities, Model, accuracy, top_probability};
pub use oracle::{IdealLabeler, Oracle};
pub use strategy::QueryStrategy;
pub use types::*;
