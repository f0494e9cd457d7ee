//! Uniform random sampling

use albl_core::{Dataset, InstanceId, QueryStrategy, StrategyError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;

/// Picks an unlabeled instance uniformly at random
#[derive(Debug)]
pub struct RandomSampling {
    rng: StdRng,
}

impl RandomSampling {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence for tests and reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSampling {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryStrategy for RandomSampling {
    fn name(&self) -> &str {
        "random"
    }

    fn propose_query(&mut self, dataset: &Dataset) -> Result<InstanceId, StrategyError> {
        dataset
            .get_unlabeled()
            .map(|(id, _)| id)
            .choose(&mut self.rng)
            .ok_or(StrategyError::ExhaustedPool)
    }
}
