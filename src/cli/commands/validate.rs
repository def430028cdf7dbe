//! `validate`: parse a task file and summarize it.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{CombineMode, EvaluationTask};
use crate::infrastructure::TaskLoader;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Task file (JSON, or YAML by extension)
    #[arg(short, long)]
    pub task: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub valid: bool,
    pub mode: CombineMode,
    pub query_sets: usize,
    pub n_queries: usize,
    pub n_groups: usize,
    #[serde(skip)]
    table: String,
}

impl ValidateOutput {
    pub fn from_task(task: &EvaluationTask) -> Self {
        Self {
            valid: true,
            mode: task.mode,
            query_sets: task.query_sets.len(),
            n_queries: task.n_queries(),
            n_groups: task
                .query_sets
                .iter()
                .flat_map(|set| &set.queries)
                .map(|q| q.groups.len())
                .sum(),
            table: TableFormatter::new().format_task(task),
        }
    }
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        format!(
            "Task is valid: {} query set(s), {} queries, {} groups, mode {}\n\n{}",
            self.query_sets, self.n_queries, self.n_groups, self.mode, self.table
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ValidateArgs, json: bool) -> Result<()> {
    let task = TaskLoader::load(&args.task)?;
    output(&ValidateOutput::from_task(&task), json);
    Ok(())
}
