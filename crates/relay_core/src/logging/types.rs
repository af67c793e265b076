//! Logging types and configuration.

use serde::{Deserialize, Serialize};

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string for `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration for per-run logging.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to output.
    pub level: LogLevel,
    /// Compact mode: filter progress and keep tool output in the tail only.
    pub compact: bool,
    /// Progress step percentage for compact filtering.
    pub progress_step: u8,
    /// Number of tool output lines kept for error diagnosis.
    pub error_tail: usize,
    pub show_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: 20,
            error_tail: 20,
            show_timestamps: true,
        }
    }
}

/// Extra sink receiving every formatted log line.
pub type LogSink = Box<dyn Fn(&str) + Send + Sync>;

/// Message prefix types for consistent formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// `$ command`
    Command,
    /// `=== Phase ===`
    Phase,
    /// `--- Section ---`
    Section,
    /// `[SUCCESS]`
    Success,
    /// `[WARNING]`
    Warning,
    /// `[ERROR]`
    Error,
}

impl MessagePrefix {
    pub fn format(&self, message: &str) -> String {
        match self {
            MessagePrefix::Command => format!("$ {}", message),
            MessagePrefix::Phase => format!("=== {} ===", message),
            MessagePrefix::Section => format!("--- {} ---", message),
            MessagePrefix::Success => format!("[SUCCESS] {}", message),
            MessagePrefix::Warning => format!("[WARNING] {}", message),
            MessagePrefix::Error => format!("[ERROR] {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_lowercase() {
        let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(level, LogLevel::Debug);
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"warn\"");
        assert_eq!(LogLevel::Info.as_filter(), "info");
        assert!(LogLevel::Debug < LogLevel::Info);
    }

    #[test]
    fn prefixes_format() {
        assert_eq!(MessagePrefix::Phase.format("Transform"), "=== Transform ===");
        assert_eq!(MessagePrefix::Command.format("ffmpeg -i a"), "$ ffmpeg -i a");
    }
}
