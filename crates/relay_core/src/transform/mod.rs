//! Stage transforms.
//!
//! A transform turns one input artifact into one output artifact while
//! reporting progress. Two implementations ship with the crate:
//! - `FfmpegTransform`: drives the external tool and parses its progress
//! - `FaultInjection`: always fails after a fixed delay, for exercising the
//!   failure path end-to-end

mod fault;
mod ffmpeg;
mod progress;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::StageId;

pub use fault::FaultInjection;
pub use ffmpeg::{output_path_for, FfmpegTransform};
pub use progress::{
    parse_clock, parse_duration_marker, parse_time_marker, percent_of, ProgressTracker,
    DEFAULT_PROGRESS_THRESHOLD,
};

/// Inputs for one transform run.
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    pub stage: StageId,
    pub input: &'a Path,
    pub args: &'a [String],
    /// Directory for the output artifact.
    pub work_dir: &'a Path,
}

/// Result of a successful transform run.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub output: PathBuf,
    /// Everything the tool wrote to stderr.
    pub diagnostics: String,
}

/// Errors from a transform run.
#[derive(Error, Debug)]
pub enum TransformError {
    /// The tool could not be started.
    #[error("Failed to run {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The tool exited with a non-zero code.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
        diagnostics: String,
    },

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The input artifact does not exist.
    #[error("Input not found: {0}")]
    InputMissing(PathBuf),

    /// Deliberate failure from a fault-injection stage.
    #[error("{0}")]
    Injected(String),
}

impl TransformError {
    pub fn launch(tool: impl Into<String>, source: io::Error) -> Self {
        Self::Launch {
            tool: tool.into(),
            source,
        }
    }

    pub fn command_failed(
        tool: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
        diagnostics: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Tool output captured before the failure, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

/// A stage's transform.
///
/// `on_progress` receives percentages in 0..=100. Tool-driving
/// implementations call it once at 0 and, once the tool has run, at 100.
pub trait Transform: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run the transform to completion.
    fn run(
        &self,
        request: &TransformRequest<'_>,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<TransformOutput, TransformError>;
}
