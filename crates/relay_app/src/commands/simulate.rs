//! Simulate command - run the whole topology in-process for one artifact.
//!
//! Every published message is delivered to every subscriber (the
//! controller and each stage worker), as a shared topic would. Handlers
//! filter on the `to` field themselves.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use relay_core::bus::MemoryBus;
use relay_core::config::Settings;
use relay_core::messages::{Inbound, IngestionTrigger};
use relay_core::models::{JobIdentity, StageId};
use relay_core::store::{JobHistory, JobRecordStore, Ledger};
use relay_core::worker::{ArtifactStorage, StageDriver};

use crate::{wiring, OutputFormat};

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Bucket of the ingested artifact.
    pub bucket: String,

    /// Key of the ingested artifact.
    pub key: String,

    /// Reported object size. A size of 0 is ignored by the controller.
    #[arg(long, default_value_t = 1)]
    pub size: u64,

    /// Local file to upload to `bucket/key` before the run.
    #[arg(long)]
    pub input: Option<PathBuf>,
}

/// Outcome of one simulated pipeline run.
#[derive(Debug)]
pub struct Simulation {
    pub job: JobIdentity,
    pub stages: Vec<StageId>,
    /// Messages delivered over the in-process bus.
    pub delivered: usize,
    pub ledger: Ledger,
}

/// Execute the simulate command.
pub fn execute(args: SimulateArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let storage = wiring::local_storage(settings);
    let mut size = args.size;

    if let Some(input) = &args.input {
        let location = relay_core::models::ArtifactLocation::new(&args.bucket, &args.key);
        storage
            .store(&location, input)
            .with_context(|| format!("Failed to upload {}", input.display()))?;
        size = std::fs::metadata(input)?.len();
    }

    let trigger = IngestionTrigger::new(args.bucket, args.key, size);
    let simulation = run(settings, wiring::event_store(settings), storage, &trigger)?;

    match format {
        OutputFormat::Json => {
            let stages: Vec<_> = simulation
                .stages
                .iter()
                .map(|stage| {
                    serde_json::json!({
                        "stage": stage.get(),
                        "phase": simulation.ledger.phase(&simulation.job, *stage).to_string(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "job": simulation.job.as_str(),
                    "delivered": simulation.delivered,
                    "stages": stages,
                })
            );
        }
        OutputFormat::Text => {
            println!(
                "{} ({} messages delivered)",
                simulation.job, simulation.delivered
            );
            for stage in &simulation.stages {
                println!(
                    "  stage {}: {}",
                    stage,
                    simulation.ledger.phase(&simulation.job, *stage)
                );
            }
        }
    }
    Ok(())
}

/// Drive one trigger through the controller and every stage worker until
/// the bus is quiet, then fold the job's events into a ledger.
pub fn run<S>(
    settings: &Settings,
    store: Arc<S>,
    storage: Arc<dyn ArtifactStorage>,
    trigger: &IngestionTrigger,
) -> Result<Simulation>
where
    S: JobRecordStore + JobHistory + 'static,
{
    let bus = Arc::new(MemoryBus::new());
    let controller = wiring::controller(settings, bus.clone(), store.clone())?;
    let stages = controller.topology().stage_ids();
    let workers: Vec<StageDriver> = stages
        .iter()
        .map(|stage| wiring::stage_driver(settings, *stage, bus.clone(), storage.clone()))
        .collect();

    controller.handle(&Inbound::Trigger(trigger.clone()))?;

    let mut delivered = 0;
    loop {
        let pending = bus.drain();
        if pending.is_empty() {
            break;
        }
        for envelope in pending {
            delivered += 1;
            tracing::debug!(
                "Delivering {} from {} to {}",
                envelope.kind(),
                envelope.from,
                envelope.to
            );
            controller.handle(&Inbound::Message(envelope.clone()))?;
            for worker in &workers {
                worker.handle(&envelope)?;
            }
        }
    }

    let job = trigger.location().job_identity();
    let ledger = Ledger::from_events(store.history(&job)?);

    Ok(Simulation {
        job,
        stages,
        delivered,
        ledger,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::models::JobResult;
    use relay_core::orchestrator::GatePolicy;
    use relay_core::store::{MemoryStore, StagePhase};
    use relay_core::worker::LocalStorage;
    use tempfile::{tempdir, TempDir};

    /// Settings rooted in a temp dir where every stage is a fault stage,
    /// so runs never need the external tool.
    fn settings_in(dir: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.paths.temp_root = dir.path().join("tmp").display().to_string();
        settings.paths.storage_root = dir.path().join("objects").display().to_string();
        settings.paths.logs_folder = dir.path().join("logs").display().to_string();
        settings.transform.fault_stages = vec![1, 2, 3];
        settings.transform.fault_delay_ms = 0;
        settings
    }

    fn stage(n: u8) -> StageId {
        StageId::new(n).unwrap()
    }

    #[test]
    fn failed_gating_stage_still_runs_next_stage() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(LocalStorage::new(&settings.paths.storage_root));
        let trigger = IngestionTrigger::new("sandbox.example.org", "clip.mp4", 1000);

        let simulation = run(&settings, store.clone(), storage, &trigger).unwrap();

        for n in 1..=3 {
            assert_eq!(
                simulation.ledger.phase(&simulation.job, stage(n)),
                StagePhase::Done(JobResult::Failed),
                "stage {}",
                n
            );
        }
        // Two starts, progress and completion from each of three stages,
        // and the start of stage 3.
        assert_eq!(simulation.delivered, 9);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn on_pass_policy_keeps_gate_closed_after_failure() {
        let dir = tempdir().unwrap();
        let mut settings = settings_in(&dir);
        settings.topology.gate_policy = GatePolicy::OnPass;
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(LocalStorage::new(&settings.paths.storage_root));
        let trigger = IngestionTrigger::new("sandbox.example.org", "clip.mp4", 1000);

        let simulation = run(&settings, store, storage, &trigger).unwrap();

        assert_eq!(
            simulation.ledger.phase(&simulation.job, stage(2)),
            StagePhase::Done(JobResult::Failed)
        );
        assert_eq!(
            simulation.ledger.phase(&simulation.job, stage(3)),
            StagePhase::Pending
        );
        assert_eq!(simulation.delivered, 6);
    }

    #[test]
    fn zero_byte_trigger_runs_nothing() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(LocalStorage::new(&settings.paths.storage_root));
        let trigger = IngestionTrigger::new("sandbox.example.org", "clip.mp4", 0);

        let simulation = run(&settings, store.clone(), storage, &trigger).unwrap();

        assert_eq!(simulation.delivered, 0);
        assert!(store.is_empty());
        assert_eq!(
            simulation.ledger.phase(&simulation.job, stage(1)),
            StagePhase::Pending
        );
    }
}
