//! Declarative pipeline topology.
//!
//! The topology is a table `stage → (starts on ingestion?, gates which
//! stage?, transform args)`. The controller consumes it through one
//! generic dispatch routine, so the parallel `{1, 2} → 3` layout and the
//! sequential `1 → 2 → 3` layout are just two tables.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::errors::TopologyError;
use crate::models::{JobResult, StageId};

/// Whether a gating stage's failure still starts the next stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Start the next stage on any completion (observed behavior).
    #[default]
    Always,
    /// Start the next stage only after a `Passed` completion.
    OnPass,
}

impl GatePolicy {
    /// Whether a completion with `result` opens the gate.
    pub fn opens_on(self, result: JobResult) -> bool {
        match self {
            GatePolicy::Always => true,
            GatePolicy::OnPass => result.is_passed(),
        }
    }
}

/// Built-in topology tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyPreset {
    /// Stages 1 and 2 on ingestion; stage 2 gates stage 3.
    #[default]
    Parallel,
    /// Stage 1 on ingestion; 1 gates 2; 2 gates 3.
    Sequential,
}

/// One row of the topology table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub id: StageId,
    /// Started directly by an ingestion trigger.
    #[serde(default)]
    pub triggers_on_ingestion: bool,
    /// Stage started when this one completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gates: Option<StageId>,
    /// Transform arguments sent in this stage's `StartJob`.
    #[serde(default)]
    pub args: Vec<String>,
}

impl StageSpec {
    pub fn new(id: StageId, args: Vec<String>) -> Self {
        Self {
            id,
            triggers_on_ingestion: false,
            gates: None,
            args,
        }
    }

    pub fn on_ingestion(mut self) -> Self {
        self.triggers_on_ingestion = true;
        self
    }

    pub fn gating(mut self, next: StageId) -> Self {
        self.gates = Some(next);
        self
    }
}

/// Default transform arguments per stage position.
pub fn default_stage_args(position: u8) -> Vec<String> {
    let args: &[&str] = match position {
        1 => &["-vf", "transpose=1", "-s", "640x480"],
        2 => &["-vf", "vflip", "-c:a", "copy"],
        3 => &["-s", "640x480"],
        _ => &[],
    };
    args.iter().map(|s| s.to_string()).collect()
}

/// Validated topology table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    stages: Vec<StageSpec>,
    gate_policy: GatePolicy,
}

impl Topology {
    /// Build and validate a topology from explicit stage rows.
    pub fn new(stages: Vec<StageSpec>, gate_policy: GatePolicy) -> Result<Self, TopologyError> {
        validate(&stages)?;
        Ok(Self {
            stages,
            gate_policy,
        })
    }

    /// Build one of the built-in tables.
    pub fn preset(preset: TopologyPreset, gate_policy: GatePolicy) -> Self {
        let [s1, s2, s3] = first_three();
        let stages = match preset {
            TopologyPreset::Parallel => vec![
                StageSpec::new(s1, default_stage_args(1)).on_ingestion(),
                StageSpec::new(s2, default_stage_args(2)).on_ingestion().gating(s3),
                StageSpec::new(s3, default_stage_args(3)),
            ],
            TopologyPreset::Sequential => vec![
                StageSpec::new(s1, default_stage_args(1)).on_ingestion().gating(s2),
                StageSpec::new(s2, default_stage_args(2)).gating(s3),
                StageSpec::new(s3, default_stage_args(3)),
            ],
        };
        Self {
            stages,
            gate_policy,
        }
    }

    /// Canonical `{1, 2} → 3` topology.
    pub fn parallel() -> Self {
        Self::preset(TopologyPreset::Parallel, GatePolicy::Always)
    }

    /// Strictly sequential `1 → 2 → 3` topology.
    pub fn sequential() -> Self {
        Self::preset(TopologyPreset::Sequential, GatePolicy::Always)
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn stage(&self, id: StageId) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id).collect()
    }

    pub fn gate_policy(&self) -> GatePolicy {
        self.gate_policy
    }

    /// Stages started by an ingestion trigger, in table order.
    pub fn ingestion_stages(&self) -> impl Iterator<Item = &StageSpec> {
        self.stages.iter().filter(|s| s.triggers_on_ingestion)
    }

    /// Stage to start after `completed` finished with `result`, if any.
    pub fn next_stage(&self, completed: StageId, result: JobResult) -> Option<&StageSpec> {
        let target = self.stage(completed)?.gates?;
        if !self.gate_policy.opens_on(result) {
            return None;
        }
        self.stage(target)
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::parallel()
    }
}

fn first_three() -> [StageId; 3] {
    [StageId::MIN, StageId::MIN.successor(), StageId::MIN.successor().successor()]
}

fn validate(stages: &[StageSpec]) -> Result<(), TopologyError> {
    if stages.is_empty() {
        return Err(TopologyError::Empty);
    }

    let mut ids = HashSet::new();
    for stage in stages {
        if !ids.insert(stage.id) {
            return Err(TopologyError::DuplicateStage(stage.id));
        }
    }

    for stage in stages {
        if let Some(target) = stage.gates {
            if target == stage.id {
                return Err(TopologyError::SelfGate(stage.id));
            }
            if !ids.contains(&target) {
                return Err(TopologyError::unknown_gate_target(stage.id, target));
            }
        }
    }

    if !stages.iter().any(|s| s.triggers_on_ingestion) {
        return Err(TopologyError::NoIngestionStage);
    }

    // Every stage gates at most one other, so each chain is a simple walk.
    for start in stages {
        let mut seen = HashSet::new();
        let mut cursor = Some(start.id);
        while let Some(id) = cursor {
            if !seen.insert(id) {
                return Err(TopologyError::Cycle(start.id));
            }
            cursor = stages.iter().find(|s| s.id == id).and_then(|s| s.gates);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(n: u8) -> StageId {
        StageId::new(n).unwrap()
    }

    #[test]
    fn parallel_preset_shape() {
        let topology = Topology::parallel();
        let starts: Vec<StageId> = topology.ingestion_stages().map(|s| s.id).collect();

        assert_eq!(starts, vec![stage(1), stage(2)]);
        assert!(topology.next_stage(stage(1), JobResult::Passed).is_none());
        assert_eq!(
            topology.next_stage(stage(2), JobResult::Failed).map(|s| s.id),
            Some(stage(3))
        );
        assert!(topology.next_stage(stage(3), JobResult::Passed).is_none());
    }

    #[test]
    fn sequential_preset_chains_all_stages() {
        let topology = Topology::sequential();
        let starts: Vec<StageId> = topology.ingestion_stages().map(|s| s.id).collect();

        assert_eq!(starts, vec![stage(1)]);
        assert_eq!(
            topology.next_stage(stage(1), JobResult::Passed).map(|s| s.id),
            Some(stage(2))
        );
        assert_eq!(
            topology.next_stage(stage(2), JobResult::Passed).map(|s| s.id),
            Some(stage(3))
        );
    }

    #[test]
    fn presets_pass_validation() {
        for preset in [TopologyPreset::Parallel, TopologyPreset::Sequential] {
            let topology = Topology::preset(preset, GatePolicy::Always);
            assert!(Topology::new(topology.stages().to_vec(), GatePolicy::Always).is_ok());
        }
    }

    #[test]
    fn on_pass_policy_closes_gate_on_failure() {
        let topology = Topology::preset(TopologyPreset::Parallel, GatePolicy::OnPass);
        assert!(topology.next_stage(stage(2), JobResult::Failed).is_none());
        assert!(topology.next_stage(stage(2), JobResult::Passed).is_some());
    }

    #[test]
    fn rejects_invalid_tables() {
        let s = |n| StageSpec::new(stage(n), Vec::new());

        assert_eq!(
            Topology::new(vec![], GatePolicy::Always),
            Err(TopologyError::Empty)
        );
        assert_eq!(
            Topology::new(vec![s(1).on_ingestion(), s(1)], GatePolicy::Always),
            Err(TopologyError::DuplicateStage(stage(1)))
        );
        assert_eq!(
            Topology::new(vec![s(1).on_ingestion().gating(stage(4))], GatePolicy::Always),
            Err(TopologyError::unknown_gate_target(stage(1), stage(4)))
        );
        assert_eq!(
            Topology::new(vec![s(1).on_ingestion().gating(stage(1))], GatePolicy::Always),
            Err(TopologyError::SelfGate(stage(1)))
        );
        assert_eq!(
            Topology::new(vec![s(1), s(2)], GatePolicy::Always),
            Err(TopologyError::NoIngestionStage)
        );
        assert_eq!(
            Topology::new(
                vec![
                    s(1).on_ingestion(),
                    s(2).gating(stage(3)),
                    s(3).gating(stage(2)),
                ],
                GatePolicy::Always
            ),
            Err(TopologyError::Cycle(stage(2)))
        );
    }

    #[test]
    fn stage_rows_deserialize_from_toml() {
        let text = r#"
            id = 2
            triggers_on_ingestion = true
            gates = 3
            args = ["-s", "640x480"]
        "#;
        let spec: StageSpec = toml::from_str(text).unwrap();
        assert_eq!(spec.id, stage(2));
        assert_eq!(spec.gates, Some(stage(3)));
        assert_eq!(spec.args.len(), 2);
    }
}
