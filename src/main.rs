//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].

use clap::Parser;
use maat::cli::Cli;
use maat::monitor::{ConsoleMonitor, Monitor, ProgressMonitor};
use maat::runner;
use std::io;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::ERROR
    };
    fmt()
        .with_max_level(max_level)
        .with_writer(io::stderr)
        .init();
    let monitor: Box<dyn Monitor> = if cli.progress {
        Box::new(ProgressMonitor::new())
    } else {
        Box::new(ConsoleMonitor)
    };
    match runner::run(&cli, monitor.as_ref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = %err, "run failed");
            ExitCode::FAILURE
        }
    }
}
