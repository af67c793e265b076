//! # relay
//!
//! Local runner for the Relay pipeline.
//!
//! ## Commands
//!
//! - `relay controller <event.json>` - run one controller invocation on a platform batch
//! - `relay worker <stage> <event.json>` - run one worker invocation on a platform batch
//! - `relay simulate <bucket> <key>` - run the whole topology in-process
//! - `relay history <bucket> <key>` - print the recorded events of a job
//!
//! ## Configuration
//!
//! Settings come from a TOML file (default `.config/relay.toml`), created
//! with defaults on first run.

#![forbid(unsafe_code)]

pub mod commands;
pub mod wiring;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Relay - multi-stage media transform orchestration.
#[derive(Debug, Parser)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file.
    #[arg(long, global = true, default_value = ".config/relay.toml")]
    pub config: PathBuf,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one controller invocation on a platform event batch.
    Controller(commands::controller::ControllerArgs),
    /// Run one worker invocation on a platform event batch.
    Worker(commands::worker::WorkerArgs),
    /// Run the whole topology in-process for one artifact.
    Simulate(commands::simulate::SimulateArgs),
    /// Print the recorded events of a job.
    History(commands::history::HistoryArgs),
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_worker_invocation() {
        let cli = Cli::parse_from(["relay", "worker", "2", "event.json"]);

        assert_eq!(cli.config, PathBuf::from(".config/relay.toml"));
        assert_eq!(cli.format, OutputFormat::Text);
        match cli.command {
            Commands::Worker(args) => {
                assert_eq!(args.stage, 2);
                assert_eq!(args.event, PathBuf::from("event.json"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parses_simulate_with_global_flags() {
        let cli = Cli::parse_from([
            "relay",
            "simulate",
            "sandbox.example.org",
            "clip.mp4",
            "--size",
            "2048",
            "--config",
            "/etc/relay.toml",
            "--format",
            "json",
        ]);

        assert_eq!(cli.config, PathBuf::from("/etc/relay.toml"));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.bucket, "sandbox.example.org");
                assert_eq!(args.key, "clip.mp4");
                assert_eq!(args.size, 2048);
                assert!(args.input.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_missing_arguments() {
        assert!(Cli::try_parse_from(["relay", "history", "bucket"]).is_err());
        assert!(Cli::try_parse_from(["relay"]).is_err());
    }
}
