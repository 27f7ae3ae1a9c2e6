//! Progress and diagnostic reporting.
//!
//! This module provides the [`Monitor`] trait plus concrete monitors for
//! plain console output, an `indicatif` progress bar, and an in-memory
//! recorder used by tests and embedding programs.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Report build progress and diagnostics to the user.
///
/// Monitors are shared with worker threads by the parallel scheduler.
pub trait Monitor: Send + Sync {
    /// Progress information such as the job being run.
    fn info(&self, message: &str);

    /// Output requested by a script, e.g. through `echo`.
    fn print(&self, message: &str);

    /// A recoverable error such as a failed job.
    fn error(&self, message: &str);

    /// An error that ends the run. The caller stops after reporting it.
    fn fatal(&self, message: &str);

    /// A job is about to run; `current` is 1-based.
    fn job_started(&self, current: usize, total: usize, label: &str) {
        self.info(&format!("[{current}/{total}] {label}"));
    }

    /// Every scheduled job has been attempted.
    fn finished(&self) {}
}

/// Writes progress and script output to stdout, diagnostics to stderr.
#[derive(Debug, Default)]
pub struct ConsoleMonitor;

impl Monitor for ConsoleMonitor {
    fn info(&self, message: &str) {
        // Status output failures should not abort the build.
        drop(writeln!(io::stdout(), "{message}"));
    }

    fn print(&self, message: &str) {
        drop(writeln!(io::stdout(), "{message}"));
    }

    fn error(&self, message: &str) {
        drop(writeln!(io::stderr(), "ERROR: {message}"));
    }

    fn fatal(&self, message: &str) {
        drop(writeln!(io::stderr(), "FATAL: {message}"));
    }
}

/// Shows a progress bar over the job list on stderr.
pub struct ProgressMonitor {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressMonitor {
    /// Construct a monitor; the bar appears when the first job starts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(Option<&ProgressBar>)) {
        let guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_ref());
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor for ProgressMonitor {
    fn info(&self, message: &str) {
        self.with_bar(|bar| match bar {
            Some(bar) => bar.set_message(message.to_owned()),
            None => drop(writeln!(io::stderr(), "{message}")),
        });
    }

    fn print(&self, message: &str) {
        self.with_bar(|bar| match bar {
            Some(bar) => bar.suspend(|| drop(writeln!(io::stdout(), "{message}"))),
            None => drop(writeln!(io::stdout(), "{message}")),
        });
    }

    fn error(&self, message: &str) {
        self.with_bar(|bar| match bar {
            Some(bar) => bar.suspend(|| drop(writeln!(io::stderr(), "ERROR: {message}"))),
            None => drop(writeln!(io::stderr(), "ERROR: {message}")),
        });
    }

    fn fatal(&self, message: &str) {
        self.with_bar(|bar| {
            if let Some(bar) = bar {
                bar.abandon();
            }
        });
        drop(writeln!(io::stderr(), "FATAL: {message}"));
    }

    fn job_started(&self, current: usize, total: usize, label: &str) {
        let mut guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        let bar = guard.get_or_insert_with(|| {
            let bar = ProgressBar::with_draw_target(
                Some(u64::try_from(total).unwrap_or(u64::MAX)),
                ProgressDrawTarget::stderr_with_hz(12),
            );
            let style = ProgressStyle::with_template("[{pos}/{len}] {bar:30} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        });
        bar.set_position(u64::try_from(current.saturating_sub(1)).unwrap_or(u64::MAX));
        bar.set_message(label.to_owned());
    }

    fn finished(&self) {
        self.with_bar(|bar| {
            if let Some(bar) = bar {
                bar.finish();
            }
        });
    }
}

/// The kind of a recorded monitor message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// [`Monitor::info`] and [`Monitor::job_started`].
    Info,
    /// [`Monitor::print`].
    Print,
    /// [`Monitor::error`].
    Error,
    /// [`Monitor::fatal`].
    Fatal,
}

/// Records messages in memory instead of writing them.
#[derive(Debug, Default)]
pub struct RecordingMonitor {
    lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingMonitor {
    /// Construct an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: Level, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_owned()));
    }

    /// Every message recorded so far.
    #[must_use]
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages recorded at `level`.
    #[must_use]
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl Monitor for RecordingMonitor {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn print(&self, message: &str) {
        self.push(Level::Print, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }

    fn fatal(&self, message: &str) {
        self.push(Level::Fatal, message);
    }
}
