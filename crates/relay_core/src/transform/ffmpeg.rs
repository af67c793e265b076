//! FFmpeg transform driver.
//!
//! Runs `ffmpeg -i <input> <args...> -y <output>`, follows its stderr for
//! progress and captures the full stderr text as diagnostics. A non-zero
//! exit code fails the stage.

use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::progress::ProgressTracker;
use super::{Transform, TransformError, TransformOutput, TransformRequest};
use crate::models::StageId;

/// Output artifact path: `<work_dir>/<stem>.worker<N><.ext>`.
pub fn output_path_for(work_dir: &Path, input: &Path, stage: StageId) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}.worker{}.{}", stem, stage, ext.to_string_lossy()),
        None => format!("{}.worker{}", stem, stage),
    };
    work_dir.join(name)
}

/// Call `on_line` for every line of `reader`.
///
/// Status lines from the tool end in `\r` rather than `\n`, so both count
/// as terminators. Empty lines are skipped.
fn for_each_line<R: Read>(reader: R, mut on_line: impl FnMut(&str)) -> io::Result<()> {
    let mut buffer = Vec::new();
    for byte in BufReader::new(reader).bytes() {
        match byte? {
            b'\r' | b'\n' => {
                if !buffer.is_empty() {
                    on_line(&String::from_utf8_lossy(&buffer));
                    buffer.clear();
                }
            }
            b => buffer.push(b),
        }
    }
    if !buffer.is_empty() {
        on_line(&String::from_utf8_lossy(&buffer));
    }
    Ok(())
}

/// Transform backed by the ffmpeg executable.
#[derive(Debug, Clone)]
pub struct FfmpegTransform {
    tool: PathBuf,
    threshold: u8,
}

impl FfmpegTransform {
    /// Create a driver for the tool at `tool`, reporting progress in steps
    /// of at least `threshold` points.
    pub fn new(tool: impl Into<PathBuf>, threshold: u8) -> Self {
        Self {
            tool: tool.into(),
            threshold,
        }
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// Full argument vector for a run, tool first.
    pub fn command_line(&self, request: &TransformRequest<'_>, output: &Path) -> Vec<String> {
        let mut line = vec![
            self.tool.display().to_string(),
            "-i".to_string(),
            request.input.display().to_string(),
        ];
        line.extend(request.args.iter().cloned());
        line.push("-y".to_string());
        line.push(output.display().to_string());
        line
    }
}

impl Transform for FfmpegTransform {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn run(
        &self,
        request: &TransformRequest<'_>,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<TransformOutput, TransformError> {
        if !request.input.exists() {
            return Err(TransformError::InputMissing(request.input.to_path_buf()));
        }

        let output = output_path_for(request.work_dir, request.input, request.stage);
        let tool_name = self.tool.display().to_string();

        let mut tracker = ProgressTracker::new(self.threshold);
        if let Some(percent) = tracker.start() {
            on_progress(percent);
        }

        let mut cmd = Command::new(&self.tool);
        cmd.arg("-i")
            .arg(request.input)
            .args(request.args)
            .arg("-y")
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::debug!("Running: {}", self.command_line(request, &output).join(" "));

        let mut child = cmd
            .spawn()
            .map_err(|e| TransformError::launch(&tool_name, e))?;

        let stderr = child.stderr.take().ok_or_else(|| {
            TransformError::io(
                "capture stderr",
                io::Error::new(io::ErrorKind::Other, "stderr was not piped"),
            )
        })?;

        let mut diagnostics = String::new();
        let read_result = for_each_line(stderr, |line| {
            diagnostics.push_str(line);
            diagnostics.push('\n');
            if let Some(percent) = tracker.observe_line(line) {
                on_progress(percent);
            }
        });

        let status = child
            .wait()
            .map_err(|e| TransformError::io("wait for transform", e))?;
        read_result.map_err(|e| TransformError::io("read transform output", e))?;

        if let Some(percent) = tracker.finish() {
            on_progress(percent);
        }

        tracing::debug!("{} result code: {:?}", tool_name, status.code());

        if !status.success() {
            let message = diagnostics
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no output")
                .to_string();
            return Err(TransformError::command_failed(
                tool_name,
                status.code().unwrap_or(-1),
                message,
                diagnostics,
            ));
        }

        Ok(TransformOutput {
            output,
            diagnostics,
        })
    }
}
