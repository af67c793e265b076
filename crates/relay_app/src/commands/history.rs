//! History command - print the append-only events of a job.

use anyhow::Result;
use chrono::DateTime;
use clap::Args;

use relay_core::config::Settings;
use relay_core::models::{ArtifactLocation, JobEvent};
use relay_core::store::JobHistory;

use crate::{wiring, OutputFormat};

/// Arguments for the history command.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Bucket of the ingested artifact.
    pub bucket: String,

    /// Key of the ingested artifact.
    pub key: String,
}

/// Execute the history command.
pub fn execute(args: HistoryArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let job = ArtifactLocation::new(args.bucket, args.key).job_identity();
    let events = wiring::event_store(settings).history(&job)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No events recorded for {}", job);
                return Ok(());
            }
            println!("Events for {}:", job);
            for event in &events {
                println!("  {}", format_event(event));
            }
        }
    }
    Ok(())
}

fn format_event(event: &JobEvent) -> String {
    let when = DateTime::from_timestamp_millis(event.timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| event.timestamp.to_string());
    let result = event
        .result
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  stage {}  {:>3}%  {}",
        when, event.stage, event.progress, result
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::models::{JobIdentity, JobResult, StageId};

    #[test]
    fn formats_progress_and_completion_rows() {
        let job = JobIdentity::new("b/k");
        let stage = StageId::new(2).unwrap();

        let running = format_event(&JobEvent::progress(job.clone(), 0, stage, 42));
        assert_eq!(running, "1970-01-01 00:00:00.000  stage 2   42%  -");

        let done = format_event(&JobEvent::completed(job, 1_500, stage, JobResult::Failed));
        assert!(done.starts_with("1970-01-01 00:00:01.500  stage 2"));
        assert!(done.ends_with("0%  Failed"));
    }
}
