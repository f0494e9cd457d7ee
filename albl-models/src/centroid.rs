//! Nearest-centroid classifier

use std::collections::BTreeMap;

use albl_core::{ClassProbabilities, Label, LabeledInstance, Model, ModelError};
use tracing::trace;

/// One mean vector per class.
///
/// Class probabilities are a softmax over negative squared distances to each
/// centroid.
#[derive(Debug, Clone, Default)]
pub struct NearestCentroid {
    centroids: Vec<(Label, Vec<f64>)>,
}

impl NearestCentroid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted centroids in ascending label order
    pub fn centroids(&self) -> &[(Label, Vec<f64>)] {
        &self.centroids
    }

    fn dimension(&self) -> Option<usize> {
        self.centroids.first().map(|(_, c)| c.len())
    }

    fn check(&self, features: &[f64]) -> Result<(), ModelError> {
        let expected = self.dimension().ok_or(ModelError::Untrained)?;
        if features.len() != expected {
            return Err(ModelError::DimensionMismatch {
                expected,
                actual: features.len(),
            });
        }
        Ok(())
    }
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Numerically stable softmax
pub(crate) fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

impl Model for NearestCentroid {
    fn train(&mut self, labeled: &[LabeledInstance]) -> Result<(), ModelError> {
        let first = labeled.first().ok_or(ModelError::EmptyTrainingSet)?;
        let dim = first.features.len();

        let mut sums: BTreeMap<Label, (Vec<f64>, usize)> = BTreeMap::new();
        for instance in labeled {
            if instance.features.len() != dim {
                return Err(ModelError::DimensionMismatch {
                    expected: dim,
                    actual: instance.features.len(),
                });
            }
            let (sum, count) = sums
                .entry(instance.label)
                .or_insert_with(|| (vec![0.0; dim], 0));
            for (s, x) in sum.iter_mut().zip(instance.features.iter()) {
                *s += x;
            }
            *count += 1;
        }

        self.centroids = sums
            .into_iter()
            .map(|(label, (sum, count))| {
                (label, sum.into_iter().map(|s| s / count as f64).collect())
            })
            .collect();
        trace!(classes = self.centroids.len(), dim, "centroids fitted");
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<Label, ModelError> {
        self.check(features)?;
        let mut best: Option<(Label, f64)> = None;
        for (label, centroid) in &self.centroids {
            let distance = squared_distance(features, centroid);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((*label, distance));
            }
        }
        best.map(|(label, _)| label).ok_or(ModelError::Untrained)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities, ModelError> {
        self.check(features)?;
        let logits: Vec<f64> = self
            .centroids
            .iter()
            .map(|(_, c)| -squared_distance(features, c))
            .collect();
        Ok(self
            .centroids
            .iter()
            .map(|(label, _)| *label)
            .zip(softmax(&logits))
            .collect())
    }

    fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }
}
