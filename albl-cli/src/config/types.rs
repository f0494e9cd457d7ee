use std::path::PathBuf;

use albl_core::{AdaptiveConfig, DatasetConfig, Model, RelabelPolicy, RewardKind};
use albl_models::{LogisticConfig, LogisticRegression, NearestCentroid};
use serde::{Deserialize, Serialize};

/// Default number of labels to request
pub const DEFAULT_BUDGET: usize = 50;

/// Default base strategies for the adaptive strategy
pub const DEFAULT_STRATEGIES: &[&str] = &[
    "random",
    "uncertainty:least_confident",
    "uncertainty:margin",
];

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAlblConfig {
    #[serde(default)]
    pub experiment: RawExperimentConfig,

    #[serde(default)]
    pub adaptive: RawAdaptiveConfig,

    #[serde(default)]
    pub dataset: RawDatasetConfig,

    #[serde(default)]
    pub synthetic: RawSyntheticConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawExperimentConfig {
    pub budget: Option<usize>,
    pub strategies: Option<Vec<String>>,
    pub model: Option<ModelKind>,
    pub initial_labeled_per_class: Option<usize>,
    pub allow_unavailable: Option<bool>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAdaptiveConfig {
    pub exploration_floor: Option<f64>,
    pub reward: Option<RewardKind>,
    pub reference_size: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDatasetConfig {
    pub relabel: Option<RelabelPolicy>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSyntheticConfig {
    pub classes: Option<usize>,
    pub per_class: Option<usize>,
    pub dimensions: Option<usize>,
    pub spread: Option<f64>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AlblConfig {
    #[serde(default)]
    pub experiment: ExperimentConfig,

    #[serde(default)]
    pub adaptive: AdaptiveConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

/// Which reference model the learner and strategies use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    NearestCentroid,
    Logistic,
}

impl ModelKind {
    pub fn build(&self) -> Box<dyn Model> {
        match self {
            Self::NearestCentroid => Box::new(NearestCentroid::new()),
            Self::Logistic => Box::new(LogisticRegression::new(LogisticConfig::default())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentConfig {
    /// Labels to request before stopping
    pub budget: usize,

    /// Base strategy specs, e.g. `random` or `uncertainty:margin`
    pub strategies: Vec<String>,

    /// Model used by the learner, the reward proxy and uncertainty sampling
    pub model: ModelKind,

    /// Labels revealed per class before the first round of a simulation
    pub initial_labeled_per_class: usize,

    /// Use failing placeholders for optional strategies whose backend is missing
    pub allow_unavailable: bool,

    /// Where to write the JSON report
    pub output: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            strategies: DEFAULT_STRATEGIES.iter().map(|s| s.to_string()).collect(),
            model: ModelKind::default(),
            initial_labeled_per_class: 1,
            allow_unavailable: false,
            output: None,
        }
    }
}

/// Gaussian blobs generated when no dataset file is given
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticConfig {
    pub classes: usize,
    pub per_class: usize,
    pub dimensions: usize,
    /// Standard deviation around each class center
    pub spread: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            classes: 3,
            per_class: 40,
            dimensions: 2,
            spread: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = AlblConfig::default();
        assert_eq!(config.experiment.budget, DEFAULT_BUDGET);
        assert_eq!(config.experiment.strategies.len(), 3);
        assert_eq!(config.experiment.model, ModelKind::NearestCentroid);
        assert_eq!(config.adaptive.exploration_floor, 0.1);
        assert_eq!(config.dataset.relabel, RelabelPolicy::Reject);
        assert_eq!(config.synthetic.classes, 3);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AlblConfig::default();
        config.experiment.budget = 12;
        config.experiment.model = ModelKind::Logistic;
        config.adaptive.reward = Some(RewardKind::ConfidenceDelta);
        config.adaptive.seed = Some(3);
        config.dataset.relabel = RelabelPolicy::AllowIdentical;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AlblConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
        assert!(toml_str.contains("model = \"logistic\""));
        assert!(toml_str.contains("reward = \"confidence_delta\""));
    }

    #[test]
    fn test_raw_config_accepts_partial_sections() {
        let raw: RawAlblConfig = toml::from_str(
            r#"
[adaptive]
exploration_floor = 0.2

[synthetic]
classes = 4
"#,
        )
        .unwrap();
        assert_eq!(raw.adaptive.exploration_floor, Some(0.2));
        assert_eq!(raw.synthetic.classes, Some(4));
        assert!(raw.experiment.budget.is_none());
    }

    #[test]
    fn test_model_kind_builds_untrained_models() {
        for kind in [ModelKind::NearestCentroid, ModelKind::Logistic] {
            assert!(!kind.build().is_trained());
        }
    }
}
