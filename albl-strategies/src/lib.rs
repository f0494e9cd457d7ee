//! albl-strategies - Reference query strategies
//!
//! Base strategies that plug into the adaptive meta-strategy, a placeholder
//! for optional strategies whose native backend is missing, and a registry
//! that builds strategies from short spec strings.

pub mod random;
pub mod registry;
pub mod unavailable;
pub mod uncertainty;

pub use random::RandomSampling;
pub use registry::{BuildContext, ModelFactory, StrategyFactory, StrategyRegistry};
pub use unavailable::UnavailableStrategy;
pub use uncertainty::{UncertaintyMethod, UncertaintySampling};
