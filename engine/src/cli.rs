//! CLI interface for Fleet
//!
//! Command-line interface using clap's derive API. Every command builds the
//! engine from configuration, does one thing, and exits.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fleet multi-agent orchestration engine
///
/// Coordinates role-bound agents that research, analyze and act on an
/// objective, grounded in a local document index.
#[derive(Parser, Debug)]
#[command(name = "fleet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the configured models
    Models,

    /// List the registered agents
    Agents,

    /// Add text files to the document index
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Search the document index
    Search {
        /// Query text
        query: String,

        /// Number of results (default: retrieval.default_k)
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Research, analyze and act on an objective with the default agents
    Run {
        /// The objective to work on
        objective: String,

        /// Run the three tasks in parallel instead of in sequence
        #[arg(long)]
        parallel: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_global_flags() {
        let cli = Cli::try_parse_from(["fleet", "run", "ship it", "--parallel", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Run {
                objective,
                parallel,
            } => {
                assert_eq!(objective, "ship it");
                assert!(parallel);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_search_k() {
        let cli = Cli::try_parse_from(["fleet", "search", "rust", "-k", "2"]).unwrap();
        assert!(matches!(cli.command, Command::Search { k: Some(2), .. }));
    }

    #[test]
    fn test_ingest_requires_files() {
        assert!(Cli::try_parse_from(["fleet", "ingest"]).is_err());
    }
}
