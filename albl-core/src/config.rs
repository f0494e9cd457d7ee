//! Configuration types for the adaptive strategy.

use serde::{Deserialize, Serialize};

use crate::adaptive::RewardKind;

/// Default exploration floor `p_min`
pub const DEFAULT_EXPLORATION_FLOOR: f64 = 0.1;

/// Default size of the reference subsample a reward proxy scores on
pub const DEFAULT_REFERENCE_SIZE: usize = 32;

/// Settings for [`AdaptiveStrategy`](crate::AdaptiveStrategy)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Exploration floor; must lie in (0, 1/K) for K base strategies
    #[serde(default = "default_exploration_floor")]
    pub exploration_floor: f64,
    /// Reward proxy; defaults to accuracy delta with a model, class balance without
    #[serde(default)]
    pub reward: Option<RewardKind>,
    /// Instances drawn for the reward proxy's reference subsample
    #[serde(default = "default_reference_size")]
    pub reference_size: usize,
    /// RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_exploration_floor() -> f64 {
    DEFAULT_EXPLORATION_FLOOR
}

fn default_reference_size() -> usize {
    DEFAULT_REFERENCE_SIZE
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            exploration_floor: DEFAULT_EXPLORATION_FLOOR,
            reward: None,
            reference_size: DEFAULT_REFERENCE_SIZE,
            seed: None,
        }
    }
}
