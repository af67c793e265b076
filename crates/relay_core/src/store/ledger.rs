//! Read-side view over the append-only event log.
//!
//! The write path never collapses duplicates. For reporting, the ledger
//! treats (job identity, stage) as a natural key and keeps the event with
//! the greatest timestamp (last write wins; ties go to the later row).

use std::collections::BTreeMap;

use crate::models::{JobEvent, JobIdentity, JobResult, StageId};

/// Observable phase of one stage of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    /// Nothing recorded yet.
    Pending,
    /// In progress at the given percent.
    Running(u8),
    /// Completed with a result. Terminal regardless of the result.
    Done(JobResult),
}

impl std::fmt::Display for StagePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StagePhase::Pending => write!(f, "pending"),
            StagePhase::Running(p) => write!(f, "running ({}%)", p),
            StagePhase::Done(r) => write!(f, "done ({})", r),
        }
    }
}

/// Current state per (job identity, stage).
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    current: BTreeMap<(JobIdentity, StageId), JobEvent>,
    observed: usize,
}

impl Ledger {
    pub fn from_events(events: impl IntoIterator<Item = JobEvent>) -> Self {
        let mut ledger = Self::default();
        for event in events {
            ledger.observe(event);
        }
        ledger
    }

    /// Fold one event into the view.
    pub fn observe(&mut self, event: JobEvent) {
        self.observed += 1;
        let key = (event.job.clone(), event.stage);
        match self.current.get(&key) {
            Some(existing) if existing.timestamp > event.timestamp => {}
            _ => {
                self.current.insert(key, event);
            }
        }
    }

    /// Latest event for one stage of one job.
    pub fn current(&self, job: &JobIdentity, stage: StageId) -> Option<&JobEvent> {
        self.current.get(&(job.clone(), stage))
    }

    pub fn phase(&self, job: &JobIdentity, stage: StageId) -> StagePhase {
        match self.current(job, stage) {
            None => StagePhase::Pending,
            Some(event) => match event.result {
                Some(result) => StagePhase::Done(result),
                None => StagePhase::Running(event.progress),
            },
        }
    }

    /// Latest event of every stage recorded for a job, by stage id.
    pub fn stages(&self, job: &JobIdentity) -> Vec<&JobEvent> {
        self.current
            .iter()
            .filter(|((j, _), _)| j == job)
            .map(|(_, event)| event)
            .collect()
    }

    /// Whether every listed stage has a completion event for the job.
    pub fn is_settled(&self, job: &JobIdentity, stages: &[StageId]) -> bool {
        stages
            .iter()
            .all(|stage| matches!(self.phase(job, *stage), StagePhase::Done(_)))
    }

    /// Distinct job identities seen.
    pub fn jobs(&self) -> Vec<&JobIdentity> {
        let mut jobs: Vec<&JobIdentity> = self.current.keys().map(|(job, _)| job).collect();
        jobs.dedup();
        jobs
    }

    /// Number of raw events folded in, duplicates included.
    pub fn observed(&self) -> usize {
        self.observed
    }
}
