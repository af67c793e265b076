//! Component construction from settings.

use std::sync::Arc;

use anyhow::{Context, Result};

use relay_core::bus::{MessageBus, OutboxBus};
use relay_core::config::Settings;
use relay_core::models::StageId;
use relay_core::orchestrator::Controller;
use relay_core::store::{JobRecordStore, JsonLinesStore, MonotonicClock};
use relay_core::transform::{FaultInjection, FfmpegTransform, Transform};
use relay_core::worker::{ArtifactStorage, LocalStorage, StageDriver};

/// Bus that appends every publication to the configured outbox file.
pub fn outbox_bus(settings: &Settings) -> Arc<OutboxBus> {
    Arc::new(OutboxBus::new(&settings.bus.topic, &settings.bus.outbox))
}

pub fn event_store(settings: &Settings) -> Arc<JsonLinesStore> {
    Arc::new(JsonLinesStore::new(&settings.store.path))
}

pub fn local_storage(settings: &Settings) -> Arc<LocalStorage> {
    Arc::new(LocalStorage::new(&settings.paths.storage_root))
}

pub fn controller(
    settings: &Settings,
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn JobRecordStore>,
) -> Result<Controller> {
    let topology = settings
        .topology
        .build()
        .context("Invalid [topology] settings")?;
    Ok(Controller::new(topology, bus, store, Arc::new(MonotonicClock::new()))
        .tolerate_store_errors(settings.store.tolerate_errors))
}

/// The configured transform for a stage: fault injection or the tool.
pub fn transform_for(settings: &Settings, stage: StageId) -> Arc<dyn Transform> {
    let transform = &settings.transform;
    if transform.is_fault_stage(stage) {
        Arc::new(FaultInjection::new(transform.fault_delay()))
    } else {
        Arc::new(FfmpegTransform::new(
            transform.tool_path(),
            transform.progress_threshold,
        ))
    }
}

/// Worker for one stage, with its own scratch directory under the temp root.
pub fn stage_driver(
    settings: &Settings,
    stage: StageId,
    bus: Arc<dyn MessageBus>,
    storage: Arc<dyn ArtifactStorage>,
) -> StageDriver {
    let work_dir = std::path::Path::new(&settings.paths.temp_root).join(stage.endpoint().to_string());
    StageDriver::new(stage, bus, storage, transform_for(settings, stage), work_dir)
        .with_logs(&settings.paths.logs_folder, settings.logging.to_log_config())
}
