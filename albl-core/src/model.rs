//! Trainable model contract

use crate::error::ModelError;
use crate::types::{Label, LabeledInstance};

/// Probability per class, in ascending label order
pub type ClassProbabilities = Vec<(Label, f64)>;

/// A trainable classifier consumed by strategies and the reward proxy.
///
/// Implementations must report [`ModelError::Untrained`] from `predict` and
/// `predict_proba` until a successful `train`. Training on an empty set fails
/// with [`ModelError::EmptyTrainingSet`] and leaves the model untrained.
pub trait Model: Send {
    /// Fit the model to the given labeled instances, replacing any prior fit
    fn train(&mut self, labeled: &[LabeledInstance]) -> Result<(), ModelError>;

    /// Most likely label for a feature vector
    fn predict(&self, features: &[f64]) -> Result<Label, ModelError>;

    /// Class distribution for a feature vector
    fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities, ModelError>;

    fn is_trained(&self) -> bool;
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn train(&mut self, labeled: &[LabeledInstance]) -> Result<(), ModelError> {
        (**self).train(labeled)
    }

    fn predict(&self, features: &[f64]) -> Result<Label, ModelError> {
        (**self).predict(features)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities, ModelError> {
        (**self).predict_proba(features)
    }

    fn is_trained(&self) -> bool {
        (**self).is_trained()
    }
}

/// Fraction of samples the model labels correctly; `None` for an empty slice
pub fn accuracy<'a, M, I>(model: &M, samples: I) -> Result<Option<f64>, ModelError>
where
    M: Model + ?Sized,
    I: IntoIterator<Item = (&'a [f64], Label)>,
{
    let mut total = 0usize;
    let mut correct = 0usize;
    for (features, label) in samples {
        total += 1;
        if model.predict(features)? == label {
            correct += 1;
        }
    }
    Ok((total > 0).then(|| correct as f64 / total as f64))
}

/// Highest class probability, the model's confidence in its prediction
pub fn top_probability(probabilities: &ClassProbabilities) -> f64 {
    probabilities
        .iter()
        .map(|(_, p)| *p)
        .fold(0.0, f64::max)
}
