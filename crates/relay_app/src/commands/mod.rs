//! Subcommand implementations.

pub mod controller;
pub mod history;
pub mod simulate;
pub mod worker;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use relay_core::messages::BatchReport;

use crate::OutputFormat;

/// Read a platform event batch from a file, or stdin for `-`.
pub(crate) fn read_event(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read event from stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event file {}", path.display()))
}

pub(crate) fn print_report(handler: &str, report: BatchReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "handler": handler,
                "handled": report.handled,
                "ignored": report.ignored,
                "failed": report.failed,
            })
        ),
        OutputFormat::Text => println!(
            "{}: {} handled, {} ignored, {} failed",
            handler, report.handled, report.ignored, report.failed
        ),
    }
}
