//! Stage driver: one worker invocation per `StartJob`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::storage::{output_location, ArtifactStorage};
use super::StageError;
use crate::bus::{BusError, MessageBus};
use crate::logging::{sanitize_filename, JobLogger, JobLoggerBuilder, LogConfig};
use crate::messages::{decode_batch, BatchReport, Envelope, Inbound, Payload};
use crate::models::{ArtifactLocation, Endpoint, JobResult, StageId};
use crate::transform::{Transform, TransformRequest};

/// Outcome of handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Not a `StartJob` for this stage from the controller.
    Ignored(String),
    /// The stage ran and its `JobCompleted` was published.
    Completed(JobResult),
}

/// Runs one stage's transform for every start message addressed to it.
pub struct StageDriver {
    stage: StageId,
    bus: Arc<dyn MessageBus>,
    storage: Arc<dyn ArtifactStorage>,
    transform: Arc<dyn Transform>,
    work_dir: PathBuf,
    logs_dir: Option<PathBuf>,
    log_config: LogConfig,
}

impl StageDriver {
    pub fn new(
        stage: StageId,
        bus: Arc<dyn MessageBus>,
        storage: Arc<dyn ArtifactStorage>,
        transform: Arc<dyn Transform>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stage,
            bus,
            storage,
            transform,
            work_dir: work_dir.into(),
            logs_dir: None,
            log_config: LogConfig::default(),
        }
    }

    /// Write a per-run log file into `logs_dir`.
    pub fn with_logs(mut self, logs_dir: impl Into<PathBuf>, config: LogConfig) -> Self {
        self.logs_dir = Some(logs_dir.into());
        self.log_config = config;
        self
    }

    pub fn stage(&self) -> StageId {
        self.stage
    }

    /// Handle one bus message.
    ///
    /// A start message always yields exactly one published `JobCompleted`;
    /// failing to publish it is the only error.
    pub fn handle(&self, envelope: &Envelope) -> Result<Disposition, BusError> {
        let me = self.stage.endpoint();
        if !envelope.is_addressed_to(me) {
            return Ok(Disposition::Ignored(format!(
                "{} is addressed to {}",
                envelope.kind(),
                envelope.to
            )));
        }
        if envelope.from != Endpoint::Controller {
            tracing::warn!("{} ignoring {} from {}", me, envelope.kind(), envelope.from);
            return Ok(Disposition::Ignored(format!(
                "{} must come from the controller, not {}",
                envelope.kind(),
                envelope.from
            )));
        }
        let Payload::StartJob(start) = &envelope.payload else {
            return Ok(Disposition::Ignored(format!(
                "{} has no meaning for a worker",
                envelope.kind()
            )));
        };

        let location = ArtifactLocation::new(&start.bucket, &start.key);
        tracing::info!("{} starting job for {}", me, location);

        let logger = self.open_logger(&location);
        logger.phase(&format!("Stage {} for {}", self.stage, location));

        logger.progress(0);
        self.notify(&Envelope::progress(self.stage, &location, 0));

        let result = match self.run_stage(&location, &start.args, &logger) {
            Ok(stored) => {
                logger.success(&format!("Stored {}", stored));
                JobResult::Passed
            }
            Err(e) => {
                tracing::error!("{} failed for {}: {}", me, location, e);
                logger.error(&e.to_string());
                JobResult::Failed
            }
        };
        logger.flush();

        self.bus
            .publish(&Envelope::completed(self.stage, &location, result))?;
        tracing::info!("{} completed {} with {}", me, location, result);

        Ok(Disposition::Completed(result))
    }

    /// Handle a platform batch, best-effort per record.
    pub fn handle_batch(&self, raw: &str) -> BatchReport {
        let mut report = BatchReport::default();

        let records = match decode_batch(raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Invalid message! {}", e);
                return report;
            }
        };

        for record in records {
            match record {
                Ok(Inbound::Message(envelope)) => match self.handle(&envelope) {
                    Ok(Disposition::Completed(_)) => report.handled += 1,
                    Ok(Disposition::Ignored(reason)) => {
                        tracing::debug!("Ignoring message: {}", reason);
                        report.ignored += 1;
                    }
                    Err(e) => {
                        tracing::error!("Failed to report completion: {}", e);
                        report.failed += 1;
                    }
                },
                Ok(Inbound::Trigger(trigger)) => {
                    tracing::debug!(
                        "Worker ignores storage trigger for {}",
                        trigger.location()
                    );
                    report.ignored += 1;
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Run the stage in its own scratch directory and remove it afterwards,
    /// whatever the outcome.
    fn run_stage(
        &self,
        location: &ArtifactLocation,
        args: &[String],
        logger: &JobLogger,
    ) -> Result<ArtifactLocation, StageError> {
        let scratch = self
            .work_dir
            .join(sanitize_filename(&location.job_identity().to_string()));
        let result = self.process(location, args, logger, &scratch);

        if scratch.exists() {
            if let Err(e) = fs::remove_dir_all(&scratch) {
                tracing::warn!("Failed to clean up {}: {}", scratch.display(), e);
            }
        }
        result
    }

    /// Retrieve, transform and store. Returns where the output was stored.
    fn process(
        &self,
        location: &ArtifactLocation,
        args: &[String],
        logger: &JobLogger,
        scratch: &Path,
    ) -> Result<ArtifactLocation, StageError> {
        logger.section("Retrieve");
        let input = self.storage.retrieve(location, scratch)?;

        logger.section("Transform");
        let request = TransformRequest {
            stage: self.stage,
            input: &input,
            args,
            work_dir: scratch,
        };
        logger.command(&format!(
            "{} -i {} {}",
            self.transform.name(),
            input.display(),
            args.join(" ")
        ));

        // Progress 0 was already reported before retrieval.
        let mut last_sent = 0u8;
        let mut on_progress = |percent: u8| {
            if percent == last_sent {
                return;
            }
            last_sent = percent;
            logger.progress(percent);
            self.notify(&Envelope::progress(self.stage, location, percent));
        };

        let output = match self.transform.run(&request, &mut on_progress) {
            Ok(output) => output,
            Err(e) => {
                if let Some(diagnostics) = e.diagnostics() {
                    logger.tool_output(self.transform.name(), diagnostics);
                }
                return Err(e.into());
            }
        };
        logger.tool_output(self.transform.name(), &output.diagnostics);

        logger.section("Store");
        let target = output_location(location, self.stage);
        self.storage.store(&target, &output.output)?;
        Ok(target)
    }

    /// Fire-and-forget publish.
    fn notify(&self, envelope: &Envelope) {
        if let Err(e) = self.bus.publish(envelope) {
            tracing::warn!("Failed to publish {}: {}", envelope.kind(), e);
        }
    }

    fn open_logger(&self, location: &ArtifactLocation) -> JobLogger {
        let name = format!("{}-{}", self.stage.endpoint(), location);
        let mut builder = JobLoggerBuilder::new(&name).config(self.log_config.clone());
        if let Some(dir) = &self.logs_dir {
            builder = builder.log_dir(dir);
        }
        builder.build().unwrap_or_else(|e| {
            tracing::warn!("Cannot open run log for {}: {}", name, e);
            JobLogger::in_memory(name, self.log_config.clone(), None)
        })
    }
}
