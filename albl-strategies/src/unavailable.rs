//! Placeholder for strategies whose native backend is missing

use albl_core::{Dataset, InstanceId, OptionalFeature, QueryStrategy, StrategyError, install_hint};

/// Stands in for an optional strategy that cannot run on this machine.
///
/// Every query fails with [`StrategyError::Unavailable`] carrying install
/// instructions, so the problem surfaces where the strategy is used.
#[derive(Debug, Clone)]
pub struct UnavailableStrategy {
    feature: OptionalFeature,
    hint: String,
}

impl UnavailableStrategy {
    pub fn new(feature: OptionalFeature) -> Self {
        Self {
            feature,
            hint: install_hint(),
        }
    }

    pub fn feature(&self) -> OptionalFeature {
        self.feature
    }

    pub fn error(&self) -> StrategyError {
        StrategyError::Unavailable {
            name: self.feature.as_str().to_string(),
            hint: self.hint.clone(),
        }
    }
}

impl QueryStrategy for UnavailableStrategy {
    fn name(&self) -> &str {
        self.feature.as_str()
    }

    fn propose_query(&mut self, _dataset: &Dataset) -> Result<InstanceId, StrategyError> {
        Err(self.error())
    }
}
