use std::path::PathBuf;

use albl_core::{ActiveLearner, Dataset, InstanceId, Label, Model, accuracy};
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tracing::{debug, info};

use super::{adaptive_strategy, seeded_rng};
use crate::config::{AlblConfig, ConfigLoader};
use crate::data::{DatasetFile, synthetic_blobs};
use crate::report::{SimulationReport, strategy_reports, strategy_table};

#[derive(Args)]
pub struct SimulateArgs {
    /// Fully labeled dataset (JSON); synthetic blobs are generated when omitted
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Extra config file, applied after user and project config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Labels to request
    #[arg(short, long)]
    pub budget: Option<usize>,

    /// Base strategy (repeatable), e.g. `random` or `uncertainty:margin`
    #[arg(short = 's', long = "strategy")]
    pub strategies: Vec<String>,

    /// Seed for data generation and strategy selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Minimum selection probability of every base strategy
    #[arg(long)]
    pub exploration_floor: Option<f64>,

    /// Write the JSON report here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl SimulateArgs {
    fn apply(&self, config: &mut AlblConfig) {
        if let Some(budget) = self.budget {
            config.experiment.budget = budget;
        }
        if !self.strategies.is_empty() {
            config.experiment.strategies = self.strategies.clone();
        }
        if let Some(seed) = self.seed {
            config.adaptive.seed = Some(seed);
        }
        if let Some(floor) = self.exploration_floor {
            config.adaptive.exploration_floor = floor;
        }
        if let Some(output) = &self.output {
            config.experiment.output = Some(output.clone());
        }
    }
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    let mut config = ConfigLoader::load(args.config.as_deref())?;
    args.apply(&mut config);

    let file = match &args.data {
        Some(path) => DatasetFile::read(path)?,
        None => synthetic_blobs(&config.synthetic, &mut seeded_rng(config.adaptive.seed))?,
    };

    let report = simulate(&config, &file).await?;

    println!("{}", strategy_table(&report.strategies));
    match report.final_accuracy() {
        Some(acc) => println!(
            "{} rounds, final accuracy {:.1}% over {} instances",
            report.rounds,
            acc * 100.0,
            report.instances
        ),
        None => println!("{} rounds, model never trained", report.rounds),
    }

    if let Some(path) = &config.experiment.output {
        report.write(path)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

/// Run the adaptive strategy against the file's ground truth
pub async fn simulate(config: &AlblConfig, file: &DatasetFile) -> Result<SimulationReport> {
    let truth = file.ground_truth()?;
    let (dataset, oracle) = file.simulation_pool(
        config.experiment.initial_labeled_per_class,
        config.dataset.clone(),
    )?;
    let initially_labeled = dataset.len_labeled();
    info!(
        instances = dataset.len(),
        labeled = initially_labeled,
        budget = config.experiment.budget,
        "simulation pool ready"
    );

    let strategy = adaptive_strategy(config, &dataset)?;

    let mut model = config.experiment.model.build();
    if let Err(e) = model.train(&dataset.labeled_snapshot()) {
        debug!(error = %e, "initial model not trained");
    }
    let mut curve = vec![pool_accuracy(Some(model.as_ref()), &dataset, &truth)];

    let mut learner = ActiveLearner::new(dataset, strategy, oracle).with_boxed_model(model);
    for _ in 0..config.experiment.budget {
        match learner.run_round().await {
            Ok(_) => curve.push(pool_accuracy(learner.model(), learner.dataset(), &truth)),
            Err(e) if e.is_exhausted() => {
                info!(rounds = learner.round(), "unlabeled pool exhausted");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let strategy = learner.strategy();
    Ok(SimulationReport {
        generated_at: Utc::now(),
        instances: learner.dataset().len(),
        initially_labeled,
        budget: config.experiment.budget,
        rounds: learner.round() as usize,
        reward_proxy: strategy.reward_proxy().to_string(),
        exploration_floor: strategy.exploration_floor(),
        seed: config.adaptive.seed,
        accuracy_curve: curve,
        strategies: strategy_reports(strategy),
        history: strategy.history().records().to_vec(),
    })
}

/// Accuracy over every instance in the pool; `None` while the model is untrained
fn pool_accuracy(model: Option<&dyn Model>, dataset: &Dataset, truth: &[Label]) -> Option<f64> {
    let model = model.filter(|m| m.is_trained())?;
    let samples = truth.iter().enumerate().filter_map(|(i, label)| {
        dataset
            .get(InstanceId(i))
            .map(|features| (&features[..], *label))
    });
    accuracy(model, samples).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyntheticConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    fn seeded_config(budget: usize) -> AlblConfig {
        let mut config = AlblConfig::default();
        config.experiment.budget = budget;
        config.adaptive.seed = Some(11);
        config.adaptive.reference_size = 8;
        config
    }

    fn blobs() -> DatasetFile {
        let synthetic = SyntheticConfig {
            classes: 2,
            per_class: 12,
            dimensions: 2,
            spread: 0.3,
        };
        synthetic_blobs(&synthetic, &mut StdRng::seed_from_u64(5)).unwrap()
    }

    #[tokio::test]
    async fn test_simulation_labels_budget_instances() {
        let report = simulate(&seeded_config(6), &blobs()).await.unwrap();

        assert_eq!(report.rounds, 6);
        assert_eq!(report.history.len(), 6);
        assert_eq!(report.accuracy_curve.len(), 7);
        assert_eq!(report.initially_labeled, 2);
        assert_eq!(report.strategies.len(), 3);
        let queries: usize = report.strategies.iter().map(|s| s.summary.queries).sum();
        assert_eq!(queries, 6);
    }

    #[tokio::test]
    async fn test_simulation_stops_when_pool_runs_out() {
        let report = simulate(&seeded_config(100), &blobs()).await.unwrap();
        assert_eq!(report.rounds, 22);
        assert_eq!(report.history.len(), 22);
        assert!(report.final_accuracy().is_some());
    }

    #[tokio::test]
    async fn test_same_seed_same_queries() {
        let file = blobs();
        let a = simulate(&seeded_config(8), &file).await.unwrap();
        let b = simulate(&seeded_config(8), &file).await.unwrap();
        let instances = |r: &SimulationReport| {
            r.history.iter().map(|q| q.instance).collect::<Vec<_>>()
        };
        assert_eq!(instances(&a), instances(&b));
    }

    #[tokio::test]
    async fn test_unlabeled_file_cannot_be_simulated() {
        let mut file = blobs();
        file.instances[3].label = None;
        assert!(simulate(&seeded_config(2), &file).await.is_err());
    }

    #[test]
    fn test_args_override_config() {
        let temp_dir = TempDir::new().unwrap();
        let args = SimulateArgs {
            data: None,
            config: None,
            budget: Some(3),
            strategies: vec!["random".into()],
            seed: Some(8),
            exploration_floor: Some(0.2),
            output: Some(temp_dir.path().join("r.json")),
        };
        let mut config = AlblConfig::default();
        args.apply(&mut config);

        assert_eq!(config.experiment.budget, 3);
        assert_eq!(config.experiment.strategies, vec!["random".to_string()]);
        assert_eq!(config.adaptive.seed, Some(8));
        assert_eq!(config.adaptive.exploration_floor, 0.2);
        assert!(config.experiment.output.is_some());
    }
}
