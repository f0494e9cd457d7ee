//! Simulation reports: terminal table and JSON file

use std::path::Path;

use albl_core::{AdaptiveStrategy, QueryRecord, StrategySummary};
use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyReport {
    #[serde(flatten)]
    pub summary: StrategySummary,
    pub log_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub generated_at: DateTime<Utc>,
    pub instances: usize,
    pub initially_labeled: usize,
    pub budget: usize,
    pub rounds: usize,
    pub reward_proxy: String,
    pub exploration_floor: f64,
    pub seed: Option<u64>,
    /// Learner accuracy over the whole pool; entry 0 is before the first round
    pub accuracy_curve: Vec<Option<f64>>,
    pub strategies: Vec<StrategyReport>,
    pub history: Vec<QueryRecord>,
}

impl SimulationReport {
    pub fn final_accuracy(&self) -> Option<f64> {
        self.accuracy_curve.last().copied().flatten()
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
}

pub fn strategy_reports(strategy: &AdaptiveStrategy) -> Vec<StrategyReport> {
    strategy
        .summaries()
        .into_iter()
        .zip(strategy.log_weights())
        .map(|(summary, log_weight)| StrategyReport {
            summary,
            log_weight: *log_weight,
        })
        .collect()
}

pub fn strategy_table(strategies: &[StrategyReport]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Strategy").fg(Color::Cyan),
        Cell::new("Queries").fg(Color::Cyan),
        Cell::new("Mean reward").fg(Color::Cyan),
        Cell::new("P(select)").fg(Color::Cyan),
        Cell::new("log w").fg(Color::Cyan),
    ]);

    for report in strategies {
        let mean = report
            .summary
            .mean_reward
            .map(|r| format!("{r:.3}"))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&report.summary.name),
            Cell::new(report.summary.queries),
            Cell::new(mean),
            Cell::new(format!("{:.3}", report.summary.probability)),
            Cell::new(format!("{:.3}", report.log_weight)),
        ]);
    }
    table
}
