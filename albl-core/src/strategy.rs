//! Query strategy contract

use crate::dataset::Dataset;
use crate::error::StrategyError;
use crate::types::{InstanceId, LabelEvent};

/// Chooses the next unlabeled instance to send to the oracle.
///
/// Strategies are interchangeable behind this trait and are injected into the
/// [`AdaptiveStrategy`](crate::AdaptiveStrategy) at construction.
pub trait QueryStrategy: Send {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Propose an id from the dataset's current unlabeled set.
    ///
    /// Must never return a labeled id. Returns
    /// [`StrategyError::ExhaustedPool`] when nothing is left to query.
    fn propose_query(&mut self, dataset: &Dataset) -> Result<InstanceId, StrategyError>;

    /// Called after every committed label, whichever strategy asked for it
    fn notify(&mut self, _dataset: &Dataset, _event: &LabelEvent) -> Result<(), StrategyError> {
        Ok(())
    }
}

impl<S: QueryStrategy + ?Sized> QueryStrategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn propose_query(&mut self, dataset: &Dataset) -> Result<InstanceId, StrategyError> {
        (**self).propose_query(dataset)
    }

    fn notify(&mut self, dataset: &Dataset, event: &LabelEvent) -> Result<(), StrategyError> {
        (**self).notify(dataset, event)
    }
}
