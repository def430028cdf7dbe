//! coverage-verifier entry point.

use anyhow::Result;
use clap::Parser;

use coverage_verifier::cli::{commands, handle_error, Cli, Commands};
use coverage_verifier::domain::models::Config;
use coverage_verifier::infrastructure::config::ConfigLoader;
use coverage_verifier::infrastructure::logging::LoggerImpl;

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // Keeps the file writer alive for the whole run.
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Evaluate(args) => commands::evaluate::execute(args, &config, cli.json).await,
        Commands::Validate(args) => commands::validate::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
