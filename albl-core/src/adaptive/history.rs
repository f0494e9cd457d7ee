//! Append-only record of meta-strategy queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{InstanceId, Label};

/// One completed round of the adaptive strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub round: u64,
    /// Index of the chosen base strategy
    pub strategy: usize,
    pub strategy_name: String,
    pub instance: InstanceId,
    pub label: Label,
    /// Selection probability of the chosen strategy
    pub probability: f64,
    /// Proxy reward in [0, 1]
    pub reward: f64,
    /// `reward / probability`
    pub weighted_reward: f64,
    pub labeled_at: DateTime<Utc>,
}

/// Aggregate per base strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub name: String,
    pub queries: usize,
    pub mean_reward: Option<f64>,
    pub probability: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryHistory {
    records: Vec<QueryRecord>,
}

impl QueryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: QueryRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&QueryRecord> {
        self.records.last()
    }

    /// Queried instances with the probability their strategy was chosen with
    pub fn queried(&self) -> impl Iterator<Item = (InstanceId, f64)> + '_ {
        self.records.iter().map(|r| (r.instance, r.probability))
    }

    /// Number of rounds won by each strategy index
    pub fn counts(&self, strategies: usize) -> Vec<usize> {
        let mut counts = vec![0; strategies];
        for record in &self.records {
            if let Some(count) = counts.get_mut(record.strategy) {
                *count += 1;
            }
        }
        counts
    }

    /// Per-strategy summary given strategy names and current probabilities
    pub fn summarize(&self, names: &[String], probabilities: &[f64]) -> Vec<StrategySummary> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let rewards: Vec<f64> = self
                    .records
                    .iter()
                    .filter(|r| r.strategy == i)
                    .map(|r| r.reward)
                    .collect();
                let mean_reward =
                    (!rewards.is_empty()).then(|| rewards.iter().sum::<f64>() / rewards.len() as f64);
                StrategySummary {
                    name: name.clone(),
                    queries: rewards.len(),
                    mean_reward,
                    probability: probabilities.get(i).copied().unwrap_or(0.0),
                }
            })
            .collect()
    }
}
