//! Controller command - one controller invocation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use relay_core::config::Settings;

use super::{print_report, read_event};
use crate::{wiring, OutputFormat};

/// Arguments for the controller command.
#[derive(Debug, Args)]
pub struct ControllerArgs {
    /// Platform event batch (JSON file, `-` for stdin).
    pub event: PathBuf,
}

/// Execute the controller command.
///
/// Publications go to the configured outbox, events to the configured store.
pub fn execute(args: ControllerArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let raw = read_event(&args.event)?;

    let controller = wiring::controller(
        settings,
        wiring::outbox_bus(settings),
        wiring::event_store(settings),
    )?;

    let report = controller.handle_batch(&raw);
    print_report("controller", report, format);
    Ok(())
}
