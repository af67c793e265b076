//! Relay - main entry point
//!
//! Loads settings, initializes logging and dispatches the subcommand.

use anyhow::{Context, Result};
use clap::Parser;

use relay_app::{commands, Cli, Commands};
use relay_core::config::ConfigManager;
use relay_core::logging::init_tracing_with_file;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for the logs directory path)
    let mut config_manager = ConfigManager::new(&cli.config);
    config_manager
        .load_or_create()
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    let settings = config_manager.settings();
    let _log_guard = init_tracing_with_file(settings.logging.level, &config_manager.logs_folder())
        .context("Failed to initialize logging")?;

    tracing::info!("Relay starting");
    tracing::info!("Config: {}", cli.config.display());
    tracing::info!("Core version: {}", relay_core::version());

    config_manager
        .ensure_dirs_exist()
        .context("Failed to create directories")?;

    match cli.command {
        Commands::Controller(args) => commands::controller::execute(args, settings, cli.format),
        Commands::Worker(args) => commands::worker::execute(args, settings, cli.format),
        Commands::Simulate(args) => commands::simulate::execute(args, settings, cli.format),
        Commands::History(args) => commands::history::execute(args, settings, cli.format),
    }
}
