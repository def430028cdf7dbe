//! `evaluate`: replay a navigation log against a task.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::application::{FanInStats, NavigationFanIn, SessionHandle};
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::cli::replay::{load_event_log, replay};
use crate::domain::models::{Config, SessionResult};
use crate::domain::ports::PassthroughExtractor;
use crate::infrastructure::TaskLoader;
use crate::services::Session;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Task file (JSON, or YAML by extension)
    #[arg(short, long)]
    pub task: PathBuf,

    /// Navigation event log (JSON Lines)
    #[arg(short, long)]
    pub events: PathBuf,

    /// Credit queries whose every target was seen sold out
    #[arg(long)]
    pub credit_exhausted: bool,
}

#[derive(Debug, Serialize)]
pub struct EvaluateOutput {
    pub result: SessionResult,
    pub navigation: FanInStats,
}

impl CommandOutput for EvaluateOutput {
    fn to_human(&self) -> String {
        let result = &self.result;
        let mut lines = vec![
            format!("Session:  {}", result.session_id),
            format!(
                "Score:    {:.3} ({} of {} queries covered, mode {})",
                result.score, result.n_covered, result.n_queries, result.mode
            ),
            format!("Passed:   {}", if result.passed { "yes" } else { "no" }),
            format!(
                "Sub-tasks: {} of {} complete",
                result.sub_tasks.iter().filter(|t| t.is_complete()).count(),
                result.sub_tasks.len()
            ),
            format!(
                "Pages:    {} seen, {} observations, {} duplicates skipped",
                result.stats.pages_seen, result.stats.observations_received, result.stats.duplicates_skipped
            ),
            format!(
                "Tabs:     {} attached, {} navigations applied, {} dropped",
                self.navigation.tabs_attached, self.navigation.navigations_applied, self.navigation.events_dropped
            ),
        ];
        if result.n_queries > 0 {
            lines.push(String::new());
            lines.push(TableFormatter::new().format_session_result(result));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: EvaluateArgs, config: &Config, json: bool) -> Result<()> {
    let evaluation = run(&args, config).await?;
    output(&evaluation, json);
    Ok(())
}

/// Build the session, replay the log, and collect the result.
pub async fn run(args: &EvaluateArgs, config: &Config) -> Result<EvaluateOutput> {
    let task = TaskLoader::load(&args.task)?;
    let events = load_event_log(&args.events)?;

    let mut matching = config.matching.clone();
    matching.credit_exhausted_queries |= args.credit_exhausted;

    let session = SessionHandle::new(Session::new(task, &matching));
    let fan_in = NavigationFanIn::start(session, Arc::new(PassthroughExtractor), &config.fan_in);

    info!(
        session_id = %fan_in.session().session_id(),
        events = events.len(),
        log = %args.events.display(),
        "Replaying navigation log"
    );
    let replayed = replay(&fan_in, events).await;

    let result = fan_in.compute();
    let navigation = fan_in.shutdown().await;
    replayed?;

    Ok(EvaluateOutput { result, navigation })
}
