//! Exponential weights with an exploration floor
//!
//! Weights are kept in log space. Multiplicative updates become additions, so
//! no amount of rounds can overflow a weight to infinity or drive it to zero,
//! and every arm keeps selection probability of at least `floor / K`.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weight vector over base strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationWeights {
    log_weights: Vec<f64>,
    floor: f64,
}

impl ExplorationWeights {
    /// `arms` equal weights of `1 / arms`
    pub fn uniform(arms: usize, floor: f64) -> Self {
        let initial = (1.0 / arms as f64).ln();
        Self {
            log_weights: vec![initial; arms],
            floor,
        }
    }

    pub fn len(&self) -> usize {
        self.log_weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_weights.is_empty()
    }

    /// The exploration floor `p_min`
    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn log_weights(&self) -> &[f64] {
        &self.log_weights
    }

    /// Raw, unnormalized weights
    pub fn weights(&self) -> Vec<f64> {
        self.log_weights.iter().map(|lw| lw.exp()).collect()
    }

    /// `P[i] = (1 - p_min) * w[i] / sum(w) + p_min / K`
    pub fn probabilities(&self) -> Vec<f64> {
        let arms = self.log_weights.len() as f64;
        let max = self
            .log_weights
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let scaled: Vec<f64> = self.log_weights.iter().map(|lw| (lw - max).exp()).collect();
        let total: f64 = scaled.iter().sum();
        scaled
            .iter()
            .map(|w| (1.0 - self.floor) * w / total + self.floor / arms)
            .collect()
    }

    /// Draw an arm; returns it with the probability it was drawn with
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, f64) {
        let probabilities = self.probabilities();
        let arm = sample_index(&probabilities, rng);
        (arm, probabilities[arm])
    }

    /// `w[arm] <- w[arm] * exp(p_min * weighted_reward / K)`; other arms untouched
    pub fn reward(&mut self, arm: usize, weighted_reward: f64) {
        let arms = self.log_weights.len() as f64;
        self.log_weights[arm] += self.floor * weighted_reward / arms;
    }
}

/// Reward corrected for having been observed with probability `probability`
pub fn importance_weighted(reward: f64, probability: f64) -> f64 {
    reward / probability
}

fn sample_index<R: Rng + ?Sized>(probabilities: &[f64], rng: &mut R) -> usize {
    let total: f64 = probabilities.iter().sum();
    let target = rng.r#gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, p) in probabilities.iter().enumerate() {
        cumulative += p;
        if target < cumulative {
            return i;
        }
    }
    // Rounding can leave target a hair above the final cumulative sum
    probabilities.len() - 1
}
