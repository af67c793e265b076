//! Per-run logger with file and sink output.
//!
//! Each stage run gets its own logger that:
//! - Writes to a dedicated log file (or nowhere, for in-memory runs)
//! - Forwards formatted lines to an optional sink
//! - Filters progress in compact mode
//! - Keeps a tail of tool output for error diagnosis

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, LogSink, MessagePrefix};

/// Tool output longer than this is logged as head and tail only.
pub const SNIP_THRESHOLD: usize = 200;

/// Lines kept at each end of snipped tool output.
pub const SNIP_KEEP: usize = 100;

const SNIP_MARKER: &str = "--- snip ---";

/// Per-run logger.
pub struct JobLogger {
    job_name: String,
    log_path: Option<PathBuf>,
    file_writer: Mutex<Option<BufWriter<File>>>,
    sink: Option<LogSink>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
    last_progress: Mutex<Option<u8>>,
}

impl JobLogger {
    /// Create a logger appending to `<log_dir>/<job_name>.log`.
    ///
    /// A redelivered run lands after the previous one in the same file.
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        sink: Option<LogSink>,
    ) -> std::io::Result<Self> {
        let job_name = job_name.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;
        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_name)));
        let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

        let mut logger = Self::in_memory(job_name, config, sink);
        logger.log_path = Some(log_path);
        logger.file_writer = Mutex::new(Some(BufWriter::new(file)));
        Ok(logger)
    }

    /// Create a logger with no backing file.
    pub fn in_memory(job_name: impl Into<String>, config: LogConfig, sink: Option<LogSink>) -> Self {
        let tail_capacity = config.error_tail;
        Self {
            job_name: job_name.into(),
            log_path: None,
            file_writer: Mutex::new(None),
            sink,
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(tail_capacity)),
            last_progress: Mutex::new(None),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Path of the log file, if this logger writes one.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log a command line being executed.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn section(&self, section_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Section.format(section_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log a progress update, filtered to `progress_step` intervals in
    /// compact mode. 100% always passes.
    ///
    /// Returns true if the progress was logged.
    pub fn progress(&self, percent: u8) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);
            let due = match *last {
                None => true,
                Some(prev) => percent / step > prev / step || (percent == 100 && prev < 100),
            };
            if !due {
                return false;
            }
            *last = Some(percent);
        }

        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Record one line of tool output.
    ///
    /// Always kept in the tail buffer; written out only outside compact mode.
    pub fn output_line(&self, line: &str) {
        self.push_tail(line);
        if self.config.compact {
            return;
        }
        self.output(&self.format_message(line));
    }

    /// Write a tool's full diagnostic output.
    ///
    /// Output longer than [`SNIP_THRESHOLD`] lines is cut to the first and
    /// last [`SNIP_KEEP`] lines around a snip marker. Returns the number of
    /// lines written.
    pub fn tool_output(&self, tool: &str, diagnostics: &str) -> usize {
        let lines: Vec<&str> = diagnostics.lines().collect();
        for line in &lines {
            self.push_tail(line);
        }

        self.section(&format!("{} output", tool));
        if lines.len() > SNIP_THRESHOLD {
            for line in &lines[..SNIP_KEEP] {
                self.info(line);
            }
            self.info(SNIP_MARKER);
            for line in &lines[lines.len() - SNIP_KEEP..] {
                self.info(line);
            }
            SNIP_KEEP * 2
        } else {
            for line in &lines {
                self.info(line);
            }
            lines.len()
        }
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Flush and release the log file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn push_tail(&self, line: &str) {
        if self.config.error_tail == 0 {
            return;
        }
        let mut buffer = self.tail_buffer.lock();
        if buffer.len() >= self.config.error_tail {
            buffer.pop_front();
        }
        buffer.push_back(line.to_string());
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }
        if let Some(ref sink) = self.sink {
            sink(formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Make a job name safe for use as a file name.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Fluent construction for [`JobLogger`].
pub struct JobLoggerBuilder {
    job_name: String,
    log_dir: Option<PathBuf>,
    config: LogConfig,
    sink: Option<LogSink>,
}

impl JobLoggerBuilder {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            log_dir: None,
            config: LogConfig::default(),
            sink: None,
        }
    }

    /// Write a log file into `dir`. Without one the logger is in-memory.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> std::io::Result<JobLogger> {
        match self.log_dir {
            Some(dir) => JobLogger::new(self.job_name, dir, self.config, self.sink),
            None => Ok(JobLogger::in_memory(self.job_name, self.config, self.sink)),
        }
    }
}
