//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::evaluate::EvaluateArgs;
use super::commands::validate::ValidateArgs;

#[derive(Parser, Debug)]
#[command(name = "coverage-verifier")]
#[command(about = "Score whether a browsing agent found the requested listings", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .coverage/config.yaml, .coverage/local.yaml and COVERAGE_* variables)
    #[arg(short, long, global = true, env = "COVERAGE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded navigation log against a task and report coverage
    Evaluate(EvaluateArgs),

    /// Parse and validate a task file
    Validate(ValidateArgs),
}
