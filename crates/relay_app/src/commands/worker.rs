//! Worker command - one stage worker invocation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use relay_core::config::Settings;
use relay_core::models::StageId;

use super::{print_report, read_event};
use crate::{wiring, OutputFormat};

/// Arguments for the worker command.
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Stage this worker runs (1-based).
    pub stage: u8,

    /// Platform event batch (JSON file, `-` for stdin).
    pub event: PathBuf,
}

/// Execute the worker command.
pub fn execute(args: WorkerArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let stage = StageId::try_from(args.stage).context("Invalid stage")?;
    let raw = read_event(&args.event)?;

    let driver = wiring::stage_driver(
        settings,
        stage,
        wiring::outbox_bus(settings),
        wiring::local_storage(settings),
    );

    let report = driver.handle_batch(&raw);
    print_report(&stage.endpoint().to_string(), report, format);
    Ok(())
}
