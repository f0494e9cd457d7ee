//! Multinomial logistic regression

use albl_core::{ClassProbabilities, Label, LabeledInstance, Model, ModelError};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::centroid::softmax;

/// Training settings for [`LogisticRegression`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticConfig {
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// L2 penalty on the weights; the bias is not penalized
    #[serde(default = "default_l2")]
    pub l2: f64,
}

fn default_learning_rate() -> f64 {
    0.5
}

fn default_epochs() -> usize {
    200
}

fn default_l2() -> f64 {
    1e-3
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            l2: default_l2(),
        }
    }
}

#[derive(Debug, Clone)]
struct Fit {
    classes: Vec<Label>,
    /// One row per class: feature weights followed by the bias
    weights: Vec<Vec<f64>>,
}

impl Fit {
    fn dimension(&self) -> usize {
        self.weights.first().map_or(0, |w| w.len() - 1)
    }

    fn logits(&self, features: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .map(|row| {
                let (w, bias) = row.split_at(row.len() - 1);
                w.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + bias[0]
            })
            .collect()
    }
}

/// Softmax regression fit by full-batch gradient descent
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    config: LogisticConfig,
    fit: Option<Fit>,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self { config, fit: None }
    }

    pub fn config(&self) -> &LogisticConfig {
        &self.config
    }

    /// Labels seen in training, ascending
    pub fn classes(&self) -> &[Label] {
        self.fit.as_ref().map_or(&[], |f| f.classes.as_slice())
    }

    fn fitted(&self, features: &[f64]) -> Result<&Fit, ModelError> {
        let fit = self.fit.as_ref().ok_or(ModelError::Untrained)?;
        if features.len() != fit.dimension() {
            return Err(ModelError::DimensionMismatch {
                expected: fit.dimension(),
                actual: features.len(),
            });
        }
        Ok(fit)
    }
}

impl Model for LogisticRegression {
    fn train(&mut self, labeled: &[LabeledInstance]) -> Result<(), ModelError> {
        let first = labeled.first().ok_or(ModelError::EmptyTrainingSet)?;
        let dim = first.features.len();
        if let Some(bad) = labeled.iter().find(|l| l.features.len() != dim) {
            return Err(ModelError::DimensionMismatch {
                expected: dim,
                actual: bad.features.len(),
            });
        }

        let mut classes: Vec<Label> = labeled.iter().map(|l| l.label).collect();
        classes.sort_unstable();
        classes.dedup();
        let targets: Vec<usize> = labeled
            .iter()
            .map(|l| classes.binary_search(&l.label).unwrap_or_default())
            .collect();

        let mut fit = Fit {
            weights: vec![vec![0.0; dim + 1]; classes.len()],
            classes,
        };
        let n = labeled.len() as f64;
        let LogisticConfig {
            learning_rate,
            epochs,
            l2,
        } = self.config;

        for _ in 0..epochs {
            let mut grad = vec![vec![0.0; dim + 1]; fit.classes.len()];
            for (instance, target) in labeled.iter().zip(&targets) {
                let proba = softmax(&fit.logits(&instance.features));
                for (k, row) in grad.iter_mut().enumerate() {
                    let err = proba[k] - if k == *target { 1.0 } else { 0.0 };
                    for (g, x) in row.iter_mut().zip(instance.features.iter()) {
                        *g += err * x;
                    }
                    row[dim] += err;
                }
            }
            for (row, g) in fit.weights.iter_mut().zip(&grad) {
                for j in 0..dim {
                    row[j] -= learning_rate * (g[j] / n + l2 * row[j]);
                }
                row[dim] -= learning_rate * g[dim] / n;
            }
        }

        trace!(classes = fit.classes.len(), dim, epochs, "logistic regression fitted");
        self.fit = Some(fit);
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<Label, ModelError> {
        let proba = self.predict_proba(features)?;
        let mut best: Option<(Label, f64)> = None;
        for (label, p) in proba {
            if best.is_none_or(|(_, top)| p > top) {
                best = Some((label, p));
            }
        }
        best.map(|(label, _)| label).ok_or(ModelError::Untrained)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities, ModelError> {
        let fit = self.fitted(features)?;
        Ok(fit
            .classes
            .iter()
            .copied()
            .zip(softmax(&fit.logits(features)))
            .collect())
    }

    fn is_trained(&self) -> bool {
        self.fit.is_some()
    }
}
