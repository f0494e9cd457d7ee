//! Dataset files and synthetic data
//!
//! File format: `{ "instances": [ { "features": [..], "label": 1 | null } ] }`

use std::collections::HashMap;
use std::path::Path;

use albl_core::{Dataset, DatasetConfig, IdealLabeler, InstanceId, Label};
use anyhow::{Context, Result, bail};
use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::SyntheticConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub features: Vec<f64>,
    #[serde(default)]
    pub label: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetFile {
    pub instances: Vec<InstanceRecord>,
}

impl DatasetFile {
    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        let file: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid dataset file {}", path.display()))?;
        file.validate()?;
        Ok(file)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Non-empty, and every feature vector has the same length
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.instances.first() else {
            bail!("Dataset has no instances");
        };
        let dim = first.features.len();
        if dim == 0 {
            bail!("Instances must have at least one feature");
        }
        if let Some((i, bad)) = self
            .instances
            .iter()
            .enumerate()
            .find(|(_, r)| r.features.len() != dim)
        {
            bail!(
                "Instance {i} has {} features, expected {dim}",
                bad.features.len()
            );
        }
        Ok(())
    }

    /// Dataset with labels exactly as in the file
    pub fn to_dataset(&self, config: DatasetConfig) -> Dataset {
        Dataset::with_config(
            self.instances
                .iter()
                .map(|r| (r.features.clone(), r.label.map(Label))),
            config,
        )
    }

    pub fn from_dataset(dataset: &Dataset) -> Self {
        let instances = (0..dataset.len())
            .filter_map(|i| {
                let id = InstanceId(i);
                let features = dataset.get(id)?;
                Some(InstanceRecord {
                    features: features.to_vec(),
                    label: dataset.label(id).map(|l| l.0),
                })
            })
            .collect();
        Self { instances }
    }

    /// Every instance's label, for simulating an oracle
    pub fn ground_truth(&self) -> Result<Vec<Label>> {
        self.instances
            .iter()
            .enumerate()
            .map(|(i, r)| {
                r.label.map(Label).with_context(|| {
                    format!("Simulation needs a label for every instance; instance {i} has none")
                })
            })
            .collect()
    }

    /// Pool for a simulation: the first `per_class` instances of each class
    /// start labeled, everything else is left for the oracle
    pub fn simulation_pool(
        &self,
        per_class: usize,
        config: DatasetConfig,
    ) -> Result<(Dataset, IdealLabeler)> {
        let truth = self.ground_truth()?;
        let mut revealed: HashMap<Label, usize> = HashMap::new();
        let entries = self.instances.iter().zip(&truth).map(|(record, label)| {
            let seen = revealed.entry(*label).or_default();
            let initial = (*seen < per_class).then_some(*label);
            *seen += 1;
            (record.features.clone(), initial)
        });
        let dataset = Dataset::with_config(entries, config);
        Ok((dataset, IdealLabeler::from_labels(truth)))
    }
}

/// Gaussian blobs around random class centers, fully labeled and shuffled
pub fn synthetic_blobs<R: Rng + ?Sized>(
    config: &SyntheticConfig,
    rng: &mut R,
) -> Result<DatasetFile> {
    if config.classes == 0 || config.per_class == 0 || config.dimensions == 0 {
        bail!("Synthetic data needs at least one class, instance and dimension");
    }
    if !(config.spread.is_finite() && config.spread >= 0.0) {
        bail!(
            "Synthetic spread must be a non-negative number, got {}",
            config.spread
        );
    }
    let noise = Normal::new(0.0, config.spread)
        .with_context(|| format!("Invalid synthetic spread {}", config.spread))?;

    let mut instances = Vec::with_capacity(config.classes * config.per_class);
    for class in 0..config.classes {
        let center: Vec<f64> = (0..config.dimensions)
            .map(|_| rng.gen_range(-6.0..6.0))
            .collect();
        for _ in 0..config.per_class {
            instances.push(InstanceRecord {
                features: center.iter().map(|c| c + noise.sample(rng)).collect(),
                label: Some(class as i64),
            });
        }
    }
    instances.shuffle(rng);
    Ok(DatasetFile { instances })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    fn record(features: Vec<f64>, label: Option<i64>) -> InstanceRecord {
        InstanceRecord { features, label }
    }

    fn labeled_file() -> DatasetFile {
        DatasetFile {
            instances: vec![
                record(vec![0.0, 1.0], Some(0)),
                record(vec![1.0, 1.0], Some(1)),
                record(vec![0.5, 0.0], Some(0)),
                record(vec![2.0, 2.0], Some(1)),
            ],
        }
    }

    #[test]
    fn test_read_accepts_null_and_missing_labels() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{"instances":[{"features":[1.0],"label":2},{"features":[3.0],"label":null},{"features":[4.0]}]}"#,
        )
        .unwrap();

        let file = DatasetFile::read(&path).unwrap();
        let dataset = file.to_dataset(DatasetConfig::default());
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.len_labeled(), 1);
        assert_eq!(dataset.label(InstanceId(0)), Some(Label(2)));
    }

    #[test]
    fn test_ragged_features_are_rejected() {
        let file = DatasetFile {
            instances: vec![
                record(vec![0.0, 1.0], None),
                record(vec![1.0], None),
            ],
        };
        let err = file.validate().unwrap_err();
        assert!(err.to_string().contains("Instance 1 has 1 features"));
        assert!(DatasetFile::default().validate().is_err());
    }

    #[test]
    fn test_write_then_read_preserves_labels() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("out.json");
        let mut dataset = labeled_file().to_dataset(DatasetConfig::default());
        dataset.push(vec![9.0, 9.0], None);

        DatasetFile::from_dataset(&dataset).write(&path).unwrap();
        let back = DatasetFile::read(&path).unwrap();

        assert_eq!(back.instances.len(), 5);
        assert_eq!(back.instances[4].label, None);
        assert_eq!(back.instances[3].label, Some(1));
    }

    #[test]
    fn test_simulation_pool_reveals_per_class() {
        let (dataset, truth) = labeled_file()
            .simulation_pool(1, DatasetConfig::default())
            .unwrap();
        assert_eq!(dataset.len_labeled(), 2);
        assert_eq!(dataset.labeled_ids(), vec![InstanceId(0), InstanceId(1)]);
        assert_eq!(truth.len(), 4);
    }

    #[test]
    fn test_simulation_needs_full_ground_truth() {
        let mut file = labeled_file();
        file.instances[2].label = None;
        let err = file.simulation_pool(1, DatasetConfig::default()).unwrap_err();
        assert!(err.to_string().contains("instance 2"));
    }

    #[test]
    fn test_synthetic_blobs_shape_and_seed() {
        let config = SyntheticConfig {
            classes: 4,
            per_class: 10,
            dimensions: 3,
            spread: 0.5,
        };
        let a = synthetic_blobs(&config, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = synthetic_blobs(&config, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.instances.len(), 40);
        assert!(a.instances.iter().all(|r| r.features.len() == 3));
        a.validate().unwrap();
        assert_eq!(a.ground_truth().unwrap().len(), 40);
    }

    #[test]
    fn test_synthetic_rejects_bad_settings() {
        let mut rng = StdRng::seed_from_u64(0);
        let empty = SyntheticConfig {
            classes: 0,
            ..SyntheticConfig::default()
        };
        assert!(synthetic_blobs(&empty, &mut rng).is_err());
        let negative = SyntheticConfig {
            spread: -1.0,
            ..SyntheticConfig::default()
        };
        let err = synthetic_blobs(&negative, &mut rng).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
        let undefined = SyntheticConfig {
            spread: f64::NAN,
            ..SyntheticConfig::default()
        };
        assert!(synthetic_blobs(&undefined, &mut rng).is_err());
    }
}
