use std::path::PathBuf;

use albl_core::{
    ActiveLearner, Features, InstanceId, Label, Oracle, OracleError, QueryStrategy, RoundFailure,
};
use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use dialoguer::{Input, theme::ColorfulTheme};
use tracing::info;

use super::adaptive_strategy;
use crate::config::ConfigLoader;
use crate::data::DatasetFile;

#[derive(Args)]
pub struct LabelArgs {
    /// Dataset to label (JSON); unlabeled instances have `"label": null`
    #[arg(short, long)]
    pub data: PathBuf,

    /// Where to save labels; defaults to updating the dataset in place
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum number of labels to ask for
    #[arg(short, long)]
    pub budget: Option<usize>,

    /// Extra config file, applied after user and project config
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Asks the user for each label on the terminal
pub struct PromptOracle;

/// Empty input skips; anything else must be an integer label
pub fn parse_answer(input: &str) -> Result<Option<Label>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    input
        .parse::<i64>()
        .map(|l| Some(Label(l)))
        .map_err(|_| format!("'{input}' is not an integer label"))
}

fn prompt(id: InstanceId, features: &[f64]) -> Result<Option<Label>, String> {
    let shown: Vec<String> = features.iter().map(|f| format!("{f:.3}")).collect();
    println!();
    println!("Instance {id}: [{}]", shown.join(", "));

    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Label (empty to stop)")
        .allow_empty(true)
        .validate_with(|input: &String| parse_answer(input).map(|_| ()))
        .interact_text()
        .map_err(|e| e.to_string())?;
    parse_answer(&answer)
}

#[async_trait]
impl Oracle for PromptOracle {
    async fn label(&self, id: InstanceId, features: &Features) -> Result<Label, OracleError> {
        let features = features.clone();
        let refused = |reason: String| OracleError::Refused { id, reason };

        let answer = tokio::task::spawn_blocking(move || prompt(id, &features))
            .await
            .map_err(|e| refused(e.to_string()))?;
        match answer {
            Ok(Some(label)) => Ok(label),
            Ok(None) => Err(refused("skipped".to_string())),
            Err(e) => Err(refused(e)),
        }
    }
}

pub async fn run(args: LabelArgs) -> Result<()> {
    let config = ConfigLoader::load(args.config.as_deref())?;
    let budget = args.budget.unwrap_or(config.experiment.budget);
    let output = args.output.clone().unwrap_or_else(|| args.data.clone());

    let file = DatasetFile::read(&args.data)?;
    let dataset = file.to_dataset(config.dataset.clone());
    info!(
        instances = dataset.len(),
        unlabeled = dataset.len_unlabeled(),
        "dataset loaded"
    );

    let strategy = adaptive_strategy(&config, &dataset)?;
    let mut learner = ActiveLearner::new(dataset, strategy, PromptOracle)
        .with_boxed_model(config.experiment.model.build());

    let mut labeled = 0;
    let result = loop {
        if labeled == budget {
            break Ok(());
        }
        match learner.run_round().await {
            Ok(outcome) => {
                labeled += 1;
                DatasetFile::from_dataset(learner.dataset()).write(&output)?;
                println!(
                    "Labeled {} as {} ({} left)",
                    outcome.instance, outcome.label, outcome.unlabeled
                );
            }
            Err(e) if e.is_exhausted() => {
                println!("Every instance is labeled.");
                break Ok(());
            }
            Err(e) if matches!(e.kind, RoundFailure::Oracle(OracleError::Refused { .. })) => {
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    // Labels committed before a failure are kept
    DatasetFile::from_dataset(learner.dataset()).write(&output)?;
    println!(
        "{labeled} labels saved to {} using {}",
        output.display(),
        learner.strategy().name()
    );
    result.map_err(Into::into)
}
