//! Progress parsing and rate limiting for transform output.
//!
//! The tool prints a `Duration: HH:MM:SS.xx` marker once and a
//! `time=HH:MM:SS.xx` marker periodically on stderr. Progress is the
//! ratio of the two, reported only in steps of at least `threshold`
//! points, plus once at 0% and once at 100%.

/// Marker preceding the total media duration.
const DURATION_MARKER: &str = "Duration: ";

/// Marker preceding the current encode position.
const TIME_MARKER: &str = "time=";

/// Default minimum step between reports, in percentage points.
pub const DEFAULT_PROGRESS_THRESHOLD: u8 = 5;

/// Parse an `HH:MM:SS.xx` (or `.xxx`) clock into seconds.
pub fn parse_clock(text: &str) -> Option<f64> {
    let mut parts = text.splitn(3, ':');
    let hours = parts.next()?;
    let minutes = parts.next()?;
    let rest = parts.next()?;
    let (seconds, fraction) = rest.split_once('.')?;

    if hours.len() != 2 || minutes.len() != 2 || seconds.len() != 2 {
        return None;
    }
    if !(2..=3).contains(&fraction.len()) {
        return None;
    }
    let all_digits = [hours, minutes, seconds, fraction]
        .iter()
        .all(|p| p.bytes().all(|b| b.is_ascii_digit()));
    if !all_digits {
        return None;
    }

    let hours: u64 = hours.parse().ok()?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    let fraction_value: u64 = fraction.parse().ok()?;
    let scale = 10u64.pow(fraction.len() as u32);

    Some((hours * 3600 + minutes * 60 + seconds) as f64 + fraction_value as f64 / scale as f64)
}

/// Find `marker` in `line` and parse the clock that follows it.
fn clock_after(line: &str, marker: &str) -> Option<f64> {
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ':' || c == '.'))
        .unwrap_or(rest.len());
    parse_clock(&rest[..end])
}

/// Total duration from a `Duration:` line, in seconds.
pub fn parse_duration_marker(line: &str) -> Option<f64> {
    clock_after(line, DURATION_MARKER)
}

/// Current position from a `time=` status line, in seconds.
pub fn parse_time_marker(line: &str) -> Option<f64> {
    clock_after(line, TIME_MARKER)
}

/// `round(time / duration, 3) * 100`, truncated and clamped to 0..=100.
pub fn percent_of(time: f64, duration: f64) -> u8 {
    if duration <= 0.0 || time <= 0.0 {
        return 0;
    }
    let thousandths = (time / duration * 1000.0).round() as u64;
    (thousandths / 10).min(100) as u8
}

/// Turns transform stderr lines into rate-limited progress reports.
///
/// Reports are monotonic and never repeat a percentage.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    threshold: u8,
    duration: Option<f64>,
    last_reported: Option<u8>,
}

impl ProgressTracker {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.max(1),
            duration: None,
            last_reported: None,
        }
    }

    /// Total duration, once its marker has been seen.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn last_reported(&self) -> Option<u8> {
        self.last_reported
    }

    /// Unconditional 0% report at start.
    pub fn start(&mut self) -> Option<u8> {
        if self.last_reported.is_some() {
            return None;
        }
        self.last_reported = Some(0);
        Some(0)
    }

    /// Feed one stderr line; returns a percentage when one should be reported.
    pub fn observe_line(&mut self, line: &str) -> Option<u8> {
        let Some(duration) = self.duration else {
            self.duration = parse_duration_marker(line);
            return None;
        };

        let time = parse_time_marker(line)?;
        let percent = percent_of(time, duration);
        self.offer(percent)
    }

    /// Unconditional 100% report at the end, unless already reported.
    pub fn finish(&mut self) -> Option<u8> {
        if self.last_reported == Some(100) {
            return None;
        }
        self.last_reported = Some(100);
        Some(100)
    }

    fn offer(&mut self, percent: u8) -> Option<u8> {
        let last = self.last_reported.unwrap_or(0);
        let due = if self.last_reported.is_none() {
            true
        } else {
            u16::from(percent) >= u16::from(last) + u16::from(self.threshold)
        };
        // Reaching 100 is always worth a report, even inside the step.
        if due || (percent == 100 && last < 100) {
            self.last_reported = Some(percent);
            Some(percent)
        } else {
            None
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_line(secs: u64) -> String {
        format!(
            "frame=  100 fps=25 q=28.0 size=     256kB time=00:{:02}:{:02}.00 bitrate= 500.0kbits/s speed=1.0x",
            secs / 60,
            secs % 60
        )
    }

    #[test]
    fn parses_clocks() {
        assert_eq!(parse_clock("00:00:01.50"), Some(1.5));
        assert_eq!(parse_clock("01:01:01.500"), Some(3661.5));
        assert_eq!(parse_clock("00:00:10.00"), Some(10.0));
        assert_eq!(parse_clock("N/A"), None);
        assert_eq!(parse_clock("0:00:01.00"), None);
        assert_eq!(parse_clock("00:00:01.5"), None);
    }

    #[test]
    fn finds_markers_in_tool_output() {
        let duration = "  Duration: 00:01:40.00, start: 0.000000, bitrate: 1205 kb/s";
        assert_eq!(parse_duration_marker(duration), Some(100.0));
        assert_eq!(parse_time_marker(&status_line(50)), Some(50.0));
        assert_eq!(parse_duration_marker("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_time_marker("size=N/A time=N/A bitrate=N/A"), None);
    }

    #[test]
    fn percent_rounds_to_three_places_then_truncates() {
        assert_eq!(percent_of(45.67, 100.0), 45);
        assert_eq!(percent_of(1.0, 3.0), 33);
        assert_eq!(percent_of(2.0, 3.0), 66);
        assert_eq!(percent_of(120.0, 100.0), 100);
        assert_eq!(percent_of(5.0, 0.0), 0);
    }

    #[test]
    fn time_markers_before_duration_are_ignored() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.start(), Some(0));
        assert_eq!(tracker.observe_line(&status_line(50)), None);
        assert_eq!(tracker.duration(), None);
    }

    #[test]
    fn fires_at_start_end_and_each_five_point_step() {
        let mut tracker = ProgressTracker::new(5);
        let mut reports = Vec::new();

        reports.extend(tracker.start());
        tracker.observe_line("  Duration: 00:01:40.00, start: 0.000000");
        for secs in 1..=100 {
            reports.extend(tracker.observe_line(&status_line(secs)));
        }
        reports.extend(tracker.finish());

        let expected: Vec<u8> = (0..=100).step_by(5).collect();
        assert_eq!(reports, expected);
    }

    #[test]
    fn never_repeats_a_percentage() {
        let mut tracker = ProgressTracker::new(5);
        let mut reports = Vec::new();

        reports.extend(tracker.start());
        tracker.observe_line("Duration: 00:00:10.00");
        // Sparse, repeated and backwards markers.
        for secs in [0, 0, 3, 3, 2, 7, 7, 10, 10] {
            reports.extend(tracker.observe_line(&format!("time=00:00:{:02}.00", secs)));
        }
        reports.extend(tracker.finish());

        assert_eq!(reports, vec![0, 30, 70, 100]);
        let mut deduped = reports.clone();
        deduped.dedup();
        assert_eq!(deduped, reports);
    }

    #[test]
    fn early_exit_still_reports_bounds() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.start(), Some(0));
        assert_eq!(tracker.finish(), Some(100));
        assert_eq!(tracker.finish(), None);
    }
}
