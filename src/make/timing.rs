//! Per-job wall-clock timing and its summary rendering.

use std::time::Duration;

/// How long one job's action took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTiming {
    /// Targets of the job.
    pub label: String,
    /// Time spent in the action, whether it succeeded or failed.
    pub elapsed: Duration,
}

/// Summary lines for `timings`: a header, one line per job in completion
/// order and the total. Empty when no job ran.
#[must_use]
pub fn summary_lines(timings: &[JobTiming]) -> Vec<String> {
    if timings.is_empty() {
        return Vec::new();
    }
    let mut lines = Vec::with_capacity(timings.len() + 2);
    lines.push("timing summary:".to_owned());
    for timing in timings {
        lines.push(format!(
            "  {}: {}",
            timing.label,
            format_duration(timing.elapsed)
        ));
    }
    let total = timings
        .iter()
        .fold(Duration::ZERO, |acc, timing| acc.saturating_add(timing.elapsed));
    lines.push(format!("total: {}", format_duration(total)));
    lines
}

/// Render `duration` in the largest unit that keeps it above one.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds > 0 {
        let milliseconds = duration.subsec_millis();
        if milliseconds == 0 {
            return format!("{seconds}s");
        }
        return format!("{seconds}.{milliseconds:03}s");
    }
    if duration.as_millis() > 0 {
        return format!("{}ms", duration.as_millis());
    }
    if duration.as_micros() > 0 {
        return format!("{}us", duration.as_micros());
    }
    format!("{}ns", duration.as_nanos())
}
