//! albl-models - Reference classifiers
//!
//! Small dependency-free models that satisfy the `Model` contract, used by
//! uncertainty sampling, the reward proxies and the CLI simulations.

pub mod centroid;
pub mod logistic;

pub use centroid::NearestCentroid;
pub use logistic::{LogisticConfig, LogisticRegression};
