use std::path::{Path, PathBuf};

use albl_core::{AdaptiveConfig, DatasetConfig};
use anyhow::{Context, Result, bail};
use tracing::debug;

use super::types::{
    AlblConfig, ExperimentConfig, RawAdaptiveConfig, RawAlblConfig, RawDatasetConfig,
    RawExperimentConfig, RawSyntheticConfig, SyntheticConfig,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + explicit file)
    pub fn load(explicit: Option<&Path>) -> Result<AlblConfig> {
        let mut raw = RawAlblConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        // Layer 3: --config
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            raw = Self::merge_raw(raw, Self::read_raw(path)?);
        }

        // Convert to final config with defaults applied
        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("albl").join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with ALBL_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("ALBL_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".albl/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawAlblConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        debug!(path = %path.display(), "config layer loaded");
        Ok(raw)
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawAlblConfig, overlay: RawAlblConfig) -> RawAlblConfig {
        RawAlblConfig {
            experiment: RawExperimentConfig {
                budget: overlay.experiment.budget.or(base.experiment.budget),
                strategies: overlay.experiment.strategies.or(base.experiment.strategies),
                model: overlay.experiment.model.or(base.experiment.model),
                initial_labeled_per_class: overlay
                    .experiment
                    .initial_labeled_per_class
                    .or(base.experiment.initial_labeled_per_class),
                allow_unavailable: overlay
                    .experiment
                    .allow_unavailable
                    .or(base.experiment.allow_unavailable),
                output: overlay.experiment.output.or(base.experiment.output),
            },
            adaptive: RawAdaptiveConfig {
                exploration_floor: overlay
                    .adaptive
                    .exploration_floor
                    .or(base.adaptive.exploration_floor),
                reward: overlay.adaptive.reward.or(base.adaptive.reward),
                reference_size: overlay
                    .adaptive
                    .reference_size
                    .or(base.adaptive.reference_size),
                seed: overlay.adaptive.seed.or(base.adaptive.seed),
            },
            dataset: RawDatasetConfig {
                relabel: overlay.dataset.relabel.or(base.dataset.relabel),
            },
            synthetic: RawSyntheticConfig {
                classes: overlay.synthetic.classes.or(base.synthetic.classes),
                per_class: overlay.synthetic.per_class.or(base.synthetic.per_class),
                dimensions: overlay.synthetic.dimensions.or(base.synthetic.dimensions),
                spread: overlay.synthetic.spread.or(base.synthetic.spread),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawAlblConfig) -> AlblConfig {
        let experiment = ExperimentConfig::default();
        let adaptive = AdaptiveConfig::default();
        let synthetic = SyntheticConfig::default();
        AlblConfig {
            experiment: ExperimentConfig {
                budget: raw.experiment.budget.unwrap_or(experiment.budget),
                strategies: raw.experiment.strategies.unwrap_or(experiment.strategies),
                model: raw.experiment.model.unwrap_or(experiment.model),
                initial_labeled_per_class: raw
                    .experiment
                    .initial_labeled_per_class
                    .unwrap_or(experiment.initial_labeled_per_class),
                allow_unavailable: raw
                    .experiment
                    .allow_unavailable
                    .unwrap_or(experiment.allow_unavailable),
                output: raw.experiment.output,
            },
            adaptive: AdaptiveConfig {
                exploration_floor: raw
                    .adaptive
                    .exploration_floor
                    .unwrap_or(adaptive.exploration_floor),
                reward: raw.adaptive.reward,
                reference_size: raw.adaptive.reference_size.unwrap_or(adaptive.reference_size),
                seed: raw.adaptive.seed,
            },
            dataset: DatasetConfig {
                relabel: raw.dataset.relabel.unwrap_or_default(),
            },
            synthetic: SyntheticConfig {
                classes: raw.synthetic.classes.unwrap_or(synthetic.classes),
                per_class: raw.synthetic.per_class.unwrap_or(synthetic.per_class),
                dimensions: raw.synthetic.dimensions.unwrap_or(synthetic.dimensions),
                spread: raw.synthetic.spread.unwrap_or(synthetic.spread),
            },
        }
    }

    /// Merge the given files in order, skipping missing ones (for testing)
    #[cfg(test)]
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<AlblConfig> {
        let mut raw = RawAlblConfig::default();
        for path in paths.iter().filter(|p| p.exists()) {
            raw = Self::merge_raw(raw, Self::read_raw(path)?);
        }
        Ok(Self::finalize(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DEFAULT_BUDGET, ModelKind};
    use albl_core::{RelabelPolicy, RewardKind};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            ConfigLoader::load_from_paths(&[temp_dir.path().join("missing.toml")]).unwrap();
        assert_eq!(config, AlblConfig::default());
    }

    #[test]
    fn test_later_layers_override_earlier() {
        let temp_dir = TempDir::new().unwrap();
        let user = write(
            &temp_dir,
            "user.toml",
            r#"
[experiment]
budget = 10
model = "logistic"

[adaptive]
exploration_floor = 0.05
seed = 1
"#,
        );
        let project = write(
            &temp_dir,
            "project.toml",
            r#"
[adaptive]
seed = 2
reward = "class_balance"

[dataset]
relabel = "allow_identical"
"#,
        );

        let config = ConfigLoader::load_from_paths(&[user, project]).unwrap();

        assert_eq!(config.experiment.budget, 10);
        assert_eq!(config.experiment.model, ModelKind::Logistic);
        assert_eq!(config.adaptive.exploration_floor, 0.05);
        assert_eq!(config.adaptive.seed, Some(2));
        assert_eq!(config.adaptive.reward, Some(RewardKind::ClassBalance));
        assert_eq!(config.dataset.relabel, RelabelPolicy::AllowIdentical);
        assert_eq!(config.adaptive.reference_size, 32);
    }

    #[test]
    fn test_merge_raw_none_preserves_base() {
        let base = RawAlblConfig {
            experiment: RawExperimentConfig {
                budget: Some(7),
                strategies: Some(vec!["random".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        };
        let merged = ConfigLoader::merge_raw(base, RawAlblConfig::default());
        let config = ConfigLoader::finalize(merged);
        assert_eq!(config.experiment.budget, 7);
        assert_eq!(config.experiment.strategies, vec!["random".to_string()]);
    }

    #[test]
    fn test_finalize_applies_defaults() {
        let config = ConfigLoader::finalize(RawAlblConfig::default());
        assert_eq!(config.experiment.budget, DEFAULT_BUDGET);
        assert_eq!(config.synthetic, SyntheticConfig::default());
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "bad.toml", "this is not valid toml {{");
        assert!(ConfigLoader::load_from_paths(&[path]).is_err());
    }

    #[test]
    fn test_unknown_reward_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "bad.toml", "[adaptive]\nreward = \"luck\"\n");
        assert!(ConfigLoader::load_from_paths(&[path]).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        let err = ConfigLoader::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_user_config_path_names_albl() {
        if let Some(path) = ConfigLoader::user_config_path() {
            assert!(path.ends_with("albl/config.toml"));
        }
    }
}
