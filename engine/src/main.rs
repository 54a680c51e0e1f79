// Fleet multi-agent orchestration engine
// Main entry point for the fleet binary

use anyhow::Context;
use clap::Parser;
use fleet_engine::cli::{Cli, Command};
use fleet_engine::config::Config;
use fleet_engine::fleet::Fleet;
use fleet_engine::handlers::{
    handle_agents, handle_ingest, handle_models, handle_run, handle_search, OutputFormat,
};
use fleet_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Fleet Engine v{} ({} - {})", version, commit, timestamp);

    let fleet = Fleet::offline(config).context("Failed to assemble the engine")?;

    match cli.command {
        Command::Models => handle_models(fleet.config(), format),
        Command::Agents => handle_agents(&fleet, format),
        Command::Ingest { files } => handle_ingest(&fleet, files, format).await,
        Command::Search { query, k } => handle_search(&fleet, query, k, format).await,
        Command::Run {
            objective,
            parallel,
        } => handle_run(&fleet, objective, parallel, format).await,
    }
}
