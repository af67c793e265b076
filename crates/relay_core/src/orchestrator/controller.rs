//! Orchestration controller.
//!
//! Per job identity the controller drives
//! `Ingested → stages started on ingestion → ... → last gated stage done`.
//! It keeps no state between invocations: every decision is made from the
//! inbound event and the topology table alone, and every observed progress
//! or completion is appended to the record store.

use std::sync::Arc;

use super::errors::ControllerError;
use super::topology::Topology;
use crate::bus::MessageBus;
use crate::messages::{decode_batch, BatchReport, Envelope, Inbound, IngestionTrigger, Payload};
use crate::models::{ArtifactLocation, Endpoint, JobEvent, JobIdentity, JobResult, StageId};
use crate::store::{Clock, JobRecordStore};

/// One effect the controller applies, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Append a job event (timestamped when applied).
    Record {
        job: JobIdentity,
        stage: StageId,
        progress: u8,
        result: Option<JobResult>,
    },
    /// Publish a message on the bus.
    Publish(Envelope),
}

/// What the controller decided for one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Valid input that needs no action.
    Ignore(String),
    /// Input that cannot be acted on.
    Reject(String),
    /// Effects to apply.
    Act(Vec<Action>),
}

/// Result of handling one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Ignored(String),
    Rejected(String),
    Applied {
        recorded: Vec<JobEvent>,
        published: Vec<Envelope>,
    },
}

impl Dispatch {
    /// Events written by this invocation.
    pub fn recorded(&self) -> &[JobEvent] {
        match self {
            Dispatch::Applied { recorded, .. } => recorded,
            _ => &[],
        }
    }

    /// Messages published by this invocation.
    pub fn published(&self) -> &[Envelope] {
        match self {
            Dispatch::Applied { published, .. } => published,
            _ => &[],
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Dispatch::Applied { .. })
    }
}

/// The orchestration state machine.
pub struct Controller {
    topology: Topology,
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn JobRecordStore>,
    clock: Arc<dyn Clock>,
    tolerate_store_errors: bool,
}

impl Controller {
    pub fn new(
        topology: Topology,
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn JobRecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            topology,
            bus,
            store,
            clock,
            tolerate_store_errors: false,
        }
    }

    /// Log failed record writes instead of failing the invocation.
    pub fn tolerate_store_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_store_errors = tolerate;
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Handle one inbound event.
    ///
    /// Malformed or irrelevant input is logged and reported through the
    /// returned `Dispatch`; only collaborator failures are errors.
    pub fn handle(&self, inbound: &Inbound) -> Result<Dispatch, ControllerError> {
        match self.decide(inbound) {
            Decision::Ignore(reason) => {
                tracing::debug!("Ignoring inbound event: {}", reason);
                Ok(Dispatch::Ignored(reason))
            }
            Decision::Reject(reason) => {
                tracing::error!("Invalid message: {}", reason);
                Ok(Dispatch::Rejected(reason))
            }
            Decision::Act(actions) => self.apply(actions),
        }
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
            let inbound = match record {
                Ok(inbound) => inbound,
                Err(e) => {
                    tracing::error!("{}", e);
                    report.failed += 1;
                    continue;
                }
            };

            match self.handle(&inbound) {
                Ok(Dispatch::Applied { .. }) => report.handled += 1,
                Ok(Dispatch::Ignored(_)) => report.ignored += 1,
                Ok(Dispatch::Rejected(_)) => report.failed += 1,
                Err(e) => {
                    tracing::error!("Controller failed to apply decision: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Decide what to do for an inbound event, without side effects.
    pub fn decide(&self, inbound: &Inbound) -> Decision {
        match inbound {
            Inbound::Trigger(trigger) => self.decide_trigger(trigger),
            Inbound::Message(envelope) => self.decide_message(envelope),
        }
    }

    fn decide_trigger(&self, trigger: &IngestionTrigger) -> Decision {
        if !trigger.is_actionable() {
            return Decision::Ignore(format!(
                "zero-byte trigger for {}/{}",
                trigger.bucket, trigger.key
            ));
        }

        let location = trigger.location();
        let actions = self
            .topology
            .ingestion_stages()
            .map(|stage| Action::Publish(Envelope::start_job(stage.id, &location, &stage.args)))
            .collect();

        Decision::Act(actions)
    }

    fn decide_message(&self, envelope: &Envelope) -> Decision {
        if !envelope.is_addressed_to(Endpoint::Controller) {
            return Decision::Ignore(format!(
                "{} from {} is addressed to {}",
                envelope.kind(),
                envelope.from,
                envelope.to
            ));
        }

        tracing::info!("Handling {} from {}...", envelope.kind(), envelope.from);

        let Some(stage) = envelope.from.stage() else {
            return Decision::Reject(format!(
                "{} must come from a worker, not {}",
                envelope.kind(),
                envelope.from
            ));
        };

        if self.topology.stage(stage).is_none() {
            tracing::warn!("Stage {} is not part of the topology", stage);
        }

        match &envelope.payload {
            Payload::StartJob(_) => Decision::Reject(format!(
                "StartJob from {} cannot be addressed to the controller",
                envelope.from
            )),
            Payload::JobProgress(progress) => {
                if progress.progress > 100 {
                    return Decision::Reject(format!(
                        "progress {} from {} is out of range",
                        progress.progress, envelope.from
                    ));
                }
                let location = ArtifactLocation::new(&progress.bucket, &progress.key);
                Decision::Act(vec![Action::Record {
                    job: location.job_identity(),
                    stage,
                    progress: progress.progress,
                    result: None,
                }])
            }
            Payload::JobCompleted(done) => {
                let location = ArtifactLocation::new(&done.bucket, &done.key);
                let mut actions = vec![Action::Record {
                    job: location.job_identity(),
                    stage,
                    progress: done.result.terminal_progress(),
                    result: Some(done.result),
                }];

                match self.topology.next_stage(stage, done.result) {
                    Some(next) => actions.push(Action::Publish(Envelope::start_job(
                        next.id, &location, &next.args,
                    ))),
                    None => {
                        if self.topology.stage(stage).and_then(|s| s.gates).is_some() {
                            tracing::info!(
                                "Stage {} finished {}; gate stays closed under {:?}",
                                stage,
                                done.result,
                                self.topology.gate_policy()
                            );
                        }
                    }
                }

                Decision::Act(actions)
            }
        }
    }

    fn apply(&self, actions: Vec<Action>) -> Result<Dispatch, ControllerError> {
        let mut recorded = Vec::new();
        let mut published = Vec::new();

        for action in actions {
            match action {
                Action::Record {
                    job,
                    stage,
                    progress,
                    result,
                } => {
                    let timestamp = self.clock.now_millis();
                    let event = match result {
                        Some(result) => JobEvent::completed(job, timestamp, stage, result),
                        None => JobEvent::progress(job, timestamp, stage, progress),
                    };

                    match self.store.append(&event) {
                        Ok(()) => recorded.push(event),
                        Err(e) if self.tolerate_store_errors => {
                            tracing::error!("Failed to record event for {}: {}", event.job, e);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Action::Publish(envelope) => {
                    tracing::info!(
                        "Sending {} from {} to {}",
                        envelope.kind(),
                        envelope.from,
                        envelope.to
                    );
                    self.bus.publish(&envelope)?;
                    published.push(envelope);
                }
            }
        }

        Ok(Dispatch::Applied {
            recorded,
            published,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::messages::{batch_of, bus_delivery_record, storage_record, StartJob};
    use crate::orchestrator::topology::{GatePolicy, TopologyPreset};
    use crate::store::{MemoryStore, StepClock};

    fn stage(n: u8) -> StageId {
        StageId::new(n).unwrap()
    }

    struct Harness {
        bus: Arc<MemoryBus>,
        store: Arc<MemoryStore>,
        controller: Controller,
    }

    fn harness(topology: Topology) -> Harness {
        let bus = Arc::new(MemoryBus::new());
        let store = Arc::new(MemoryStore::new());
        let controller = Controller::new(
            topology,
            bus.clone(),
            store.clone(),
            Arc::new(StepClock::starting_at(1_000)),
        );
        Harness {
            bus,
            store,
            controller,
        }
    }

    fn location() -> ArtifactLocation {
        ArtifactLocation::new("b", "k")
    }

    fn trigger(size: u64) -> Inbound {
        Inbound::Trigger(IngestionTrigger::new("b", "k", size))
    }

    fn start_of(envelope: &Envelope) -> &StartJob {
        match &envelope.payload {
            Payload::StartJob(start) => start,
            other => panic!("expected StartJob, got {:?}", other),
        }
    }

    #[test]
    fn trigger_fans_out_to_ingestion_stages() {
        let h = harness(Topology::parallel());

        let dispatch = h.controller.handle(&trigger(1000)).unwrap();

        let published = h.bus.published();
        assert_eq!(dispatch.published(), published.as_slice());
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].to, Endpoint::Worker(stage(1)));
        assert_eq!(published[1].to, Endpoint::Worker(stage(2)));
        for envelope in &published {
            assert_eq!(envelope.from, Endpoint::Controller);
            assert_eq!(start_of(envelope).key, "k");
        }
        assert_eq!(start_of(&published[0]).args, crate::orchestrator::default_stage_args(1));
        assert_eq!(start_of(&published[1]).args, crate::orchestrator::default_stage_args(2));
        assert!(h.store.is_empty());
    }

    #[test]
    fn zero_byte_trigger_is_a_silent_noop() {
        let h = harness(Topology::parallel());

        let dispatch = h.controller.handle(&trigger(0)).unwrap();

        assert!(matches!(dispatch, Dispatch::Ignored(_)));
        assert!(h.bus.published().is_empty());
        assert!(h.store.is_empty());
    }

    #[test]
    fn progress_records_event_and_publishes_nothing() {
        let h = harness(Topology::parallel());
        let inbound = Inbound::Message(Envelope::progress(stage(1), &location(), 42));

        h.controller.handle(&inbound).unwrap();

        let events = h.store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage, stage(1));
        assert_eq!(events[0].progress, 42);
        assert_eq!(events[0].result, None);
        assert_eq!(events[0].job.as_str(), "b/k");
        assert!(h.bus.published().is_empty());
    }

    #[test]
    fn failed_gating_stage_still_starts_next_stage() {
        let h = harness(Topology::parallel());
        let inbound = Inbound::Message(Envelope::completed(stage(2), &location(), JobResult::Failed));

        h.controller.handle(&inbound).unwrap();

        let events = h.store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage, stage(2));
        assert_eq!(events[0].progress, 0);
        assert_eq!(events[0].result, Some(JobResult::Failed));

        let published = h.bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].to, Endpoint::Worker(stage(3)));
        assert_eq!(start_of(&published[0]).key, "k");
        assert_eq!(start_of(&published[0]).args, crate::orchestrator::default_stage_args(3));
    }

    #[test]
    fn gating_completion_without_string_result_still_advances() {
        let base = r#"{"from":"worker2","to":"controller","type":"JobCompleted","bucket":"b","key":"k""#;
        for tail in [r#","result":null}"#, r#","result":1}"#, r#","result":false}"#, "}"] {
            let h = harness(Topology::parallel());
            let raw = batch_of(vec![
                serde_json::json!({ "Sns": { "Message": format!("{}{}", base, tail) } }),
            ]);

            let report = h.controller.handle_batch(&raw);

            assert_eq!(report.handled, 1, "{}", tail);
            assert_eq!(report.failed, 0, "{}", tail);
            let events = h.store.events();
            assert_eq!(events.len(), 1, "{}", tail);
            assert_eq!(events[0].stage, stage(2));
            assert_eq!(events[0].progress, 0);
            assert_eq!(events[0].result, Some(JobResult::Failed));
            let published = h.bus.published();
            assert_eq!(published.len(), 1, "{}", tail);
            assert_eq!(published[0].to, Endpoint::Worker(stage(3)));
            assert_eq!(start_of(&published[0]).key, "k");
        }
    }

    #[test]
    fn passed_gating_stage_records_full_progress() {
        let h = harness(Topology::parallel());
        let inbound = Inbound::Message(Envelope::completed(stage(2), &location(), JobResult::Passed));

        h.controller.handle(&inbound).unwrap();

        assert_eq!(h.store.events()[0].progress, 100);
        assert_eq!(h.bus.published().len(), 1);
    }

    #[test]
    fn non_gating_completion_publishes_nothing() {
        let h = harness(Topology::parallel());
        for n in [1, 3] {
            let inbound =
                Inbound::Message(Envelope::completed(stage(n), &location(), JobResult::Passed));
            let dispatch = h.controller.handle(&inbound).unwrap();
            assert_eq!(dispatch.recorded().len(), 1);
        }

        assert_eq!(h.store.len(), 2);
        assert!(h.bus.published().is_empty());
    }

    #[test]
    fn duplicates_are_not_suppressed() {
        let h = harness(Topology::parallel());
        let inbound = Inbound::Message(Envelope::completed(stage(2), &location(), JobResult::Passed));

        h.controller.handle(&inbound).unwrap();
        h.controller.handle(&inbound).unwrap();

        let events = h.store.events();
        assert_eq!(events.len(), 2);
        assert!(events[1].timestamp > events[0].timestamp);
        assert_eq!(h.bus.published().len(), 2);
    }

    #[test]
    fn sequential_topology_uses_same_dispatch() {
        let h = harness(Topology::sequential());

        h.controller.handle(&trigger(10)).unwrap();
        assert_eq!(h.bus.drain().len(), 1);

        h.controller
            .handle(&Inbound::Message(Envelope::completed(
                stage(1),
                &location(),
                JobResult::Passed,
            )))
            .unwrap();
        let next = h.bus.drain();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].to, Endpoint::Worker(stage(2)));
    }

    #[test]
    fn on_pass_policy_halts_after_failure() {
        let h = harness(Topology::preset(TopologyPreset::Parallel, GatePolicy::OnPass));
        let inbound = Inbound::Message(Envelope::completed(stage(2), &location(), JobResult::Failed));

        h.controller.handle(&inbound).unwrap();

        assert_eq!(h.store.len(), 1);
        assert!(h.bus.published().is_empty());
    }

    #[test]
    fn ignores_messages_for_other_endpoints() {
        let h = harness(Topology::parallel());
        let inbound = Inbound::Message(Envelope::start_job(stage(1), &location(), &[]));

        let dispatch = h.controller.handle(&inbound).unwrap();

        assert!(matches!(dispatch, Dispatch::Ignored(_)));
        assert!(h.store.is_empty());
    }

    #[test]
    fn rejects_lifecycle_message_not_from_a_worker() {
        let h = harness(Topology::parallel());
        let mut envelope = Envelope::progress(stage(1), &location(), 10);
        envelope.from = Endpoint::Controller;

        let dispatch = h.controller.handle(&Inbound::Message(envelope)).unwrap();

        assert!(matches!(dispatch, Dispatch::Rejected(_)));
        assert!(h.store.is_empty());
    }

    #[test]
    fn rejects_out_of_range_progress() {
        let h = harness(Topology::parallel());
        let mut envelope = Envelope::progress(stage(1), &location(), 10);
        if let Payload::JobProgress(p) = &mut envelope.payload {
            p.progress = 150;
        }

        let dispatch = h.controller.handle(&Inbound::Message(envelope)).unwrap();
        assert!(matches!(dispatch, Dispatch::Rejected(_)));
    }

    #[test]
    fn store_failure_propagates_before_publishing() {
        let h = harness(Topology::parallel());
        h.store.set_offline(true);
        let inbound = Inbound::Message(Envelope::completed(stage(2), &location(), JobResult::Passed));

        let result = h.controller.handle(&inbound);

        assert!(matches!(result, Err(ControllerError::Store(_))));
        assert!(h.bus.published().is_empty());
    }

    #[test]
    fn tolerated_store_failure_still_advances_pipeline() {
        let mut h = harness(Topology::parallel());
        h.controller = h.controller.tolerate_store_errors(true);
        h.store.set_offline(true);
        let inbound = Inbound::Message(Envelope::completed(stage(2), &location(), JobResult::Passed));

        let dispatch = h.controller.handle(&inbound).unwrap();

        assert!(dispatch.recorded().is_empty());
        assert_eq!(dispatch.published().len(), 1);
    }

    #[test]
    fn batch_is_best_effort_per_record() {
        let h = harness(Topology::parallel());
        let raw = batch_of(vec![
            serde_json::json!({ "Sns": { "Message": "{broken" } }),
            storage_record(&IngestionTrigger::new("b", "k", 1000)),
            bus_delivery_record(&Envelope::progress(stage(1), &location(), 42)).unwrap(),
            storage_record(&IngestionTrigger::new("b", "gone", 0)),
        ]);

        let report = h.controller.handle_batch(&raw);

        assert_eq!(report.failed, 1);
        assert_eq!(report.handled, 2);
        assert_eq!(report.ignored, 1);
        assert_eq!(h.bus.published().len(), 2);
        assert_eq!(h.store.len(), 1);
    }

    #[test]
    fn empty_batch_is_logged_not_raised() {
        let h = harness(Topology::parallel());
        let report = h.controller.handle_batch(r#"{"Records": []}"#);
        assert_eq!(report.total(), 0);
    }
}
