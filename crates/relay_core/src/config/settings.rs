//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, LogLevel};
use crate::models::StageId;
use crate::orchestrator::{GatePolicy, StageSpec, Topology, TopologyError, TopologyPreset};
use crate::transform::DEFAULT_PROGRESS_THRESHOLD;

/// Root settings structure containing all configuration sections.
///
/// Built once at startup and handed to each component at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bus: BusSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub transform: TransformSettings,

    #[serde(default)]
    pub topology: TopologySettings,
}

/// Message bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    /// Topic every lifecycle message is published on.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// JSON-lines file the local bus appends published messages to.
    #[serde(default = "default_outbox")]
    pub outbox: String,
}

fn default_topic() -> String {
    "MainTopic".to_string()
}

fn default_outbox() -> String {
    ".relay/outbox.jsonl".to_string()
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            outbox: default_outbox(),
        }
    }
}

/// Job event store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Append-only job event log.
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Log store write failures instead of failing the controller invocation.
    #[serde(default)]
    pub tolerate_errors: bool,
}

fn default_store_path() -> String {
    ".relay/job_events.jsonl".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            tolerate_errors: false,
        }
    }
}

/// Working directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Scratch space for retrieved inputs and transform outputs.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Root of the local object storage (`<root>/<bucket>/<key>`).
    #[serde(default = "default_storage_root")]
    pub storage_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_storage_root() -> String {
    ".storage".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            storage_root: default_storage_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Progress step percentage for per-run logs.
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,

    /// Number of tool output lines kept for error diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Default level when `RUST_LOG` is not set.
    #[serde(default)]
    pub level: LogLevel,
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u8 {
    20
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
            level: LogLevel::default(),
        }
    }
}

impl LoggingSettings {
    /// Per-run logger configuration.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            compact: self.compact,
            progress_step: self.progress_step,
            error_tail: self.error_tail as usize,
            show_timestamps: true,
        }
    }
}

/// Transform driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSettings {
    /// Path or name of the ffmpeg executable.
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Minimum step between progress reports, in percentage points.
    #[serde(default = "default_progress_threshold")]
    pub progress_threshold: u8,

    /// Delay before a fault-injection stage fails.
    #[serde(default = "default_fault_delay_ms")]
    pub fault_delay_ms: u64,

    /// Stages that run the fault-injection transform instead of the tool.
    #[serde(default = "default_fault_stages")]
    pub fault_stages: Vec<u8>,
}

fn default_tool() -> String {
    "ffmpeg".to_string()
}

fn default_progress_threshold() -> u8 {
    DEFAULT_PROGRESS_THRESHOLD
}

fn default_fault_delay_ms() -> u64 {
    2000
}

fn default_fault_stages() -> Vec<u8> {
    vec![3]
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            progress_threshold: default_progress_threshold(),
            fault_delay_ms: default_fault_delay_ms(),
            fault_stages: default_fault_stages(),
        }
    }
}

impl TransformSettings {
    pub fn tool_path(&self) -> PathBuf {
        PathBuf::from(&self.tool)
    }

    pub fn fault_delay(&self) -> Duration {
        Duration::from_millis(self.fault_delay_ms)
    }

    pub fn is_fault_stage(&self, stage: StageId) -> bool {
        self.fault_stages.contains(&stage.get())
    }
}

/// Pipeline topology settings.
///
/// With no explicit `stages` rows, the preset table is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologySettings {
    #[serde(default)]
    pub preset: TopologyPreset,

    #[serde(default)]
    pub gate_policy: GatePolicy,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageSpec>,
}

impl TopologySettings {
    /// Build the validated topology.
    pub fn build(&self) -> Result<Topology, TopologyError> {
        if self.stages.is_empty() {
            Ok(Topology::preset(self.preset, self.gate_policy))
        } else {
            Topology::new(self.stages.clone(), self.gate_policy)
        }
    }
}

/// Section identifiers for atomic updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Bus,
    Store,
    Paths,
    Logging,
    Transform,
    Topology,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 6] = [
        ConfigSection::Bus,
        ConfigSection::Store,
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Transform,
        ConfigSection::Topology,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Bus => "bus",
            ConfigSection::Store => "store",
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Transform => "transform",
            ConfigSection::Topology => "topology",
        }
    }

    /// Comment written above the section in a generated file.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Bus => "Message bus topic and local outbox",
            ConfigSection::Store => "Append-only job event store",
            ConfigSection::Paths => "Working directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Transform => "Transform driver",
            ConfigSection::Topology => "Pipeline topology (preset, or explicit [[topology.stages]] rows)",
        }
    }
}
