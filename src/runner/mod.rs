//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! loads the build script, then either prints the rule database or builds
//! the requested goals. Every error that ends the run is reported through
//! the [`Monitor`] before it is returned.

mod error;

pub use error::RunnerError;

use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use miette::{Diagnostic, GraphicalReportHandler};
use tracing::{debug, info};

use crate::cli::Cli;
use crate::make::{self, MakeError, RunContext};
use crate::monitor::Monitor;
use crate::rule::DataBase;
use crate::script::{Evaluation, LoadContext, Script, ScriptError};
use crate::stdlib::Stdlib;

/// Execute the parsed [`Cli`], reporting progress through `monitor`.
///
/// # Errors
///
/// Returns an error when the script cannot be loaded, a goal cannot be
/// resolved, or a job fails. The error has already been reported through
/// `monitor.fatal`.
pub fn run(cli: &Cli, monitor: &dyn Monitor) -> Result<()> {
    dispatch(cli, monitor).inspect_err(|err| monitor.fatal(describe(err).trim_end()))
}

fn dispatch(cli: &Cli, monitor: &dyn Monitor) -> Result<()> {
    let root = resolve_root(cli.directory.as_deref())?;
    debug!(%root, file = %cli.file, "loading build script");
    let script = Script::load_in(&root, cli.file.clone())?;
    let program = script.translate()?;
    if let Some(emit) = &cli.emit {
        let path = root.join(emit);
        fs::write(&path, program.to_string())
            .with_context(|| format!("cannot write program listing to {path}"))?;
        info!(%path, "program listing written");
    }

    let stdlib = Stdlib::new();
    let load = LoadContext {
        root: &root,
        stdlib: &stdlib,
        monitor,
    };
    let evaluation = program.eval(&load)?;

    if cli.print_data_base {
        return print_data_base(&evaluation.db, cli.json);
    }
    build(cli, &evaluation, &root, &stdlib, monitor)
}

fn build(
    cli: &Cli,
    evaluation: &Evaluation,
    root: &Utf8Path,
    stdlib: &Stdlib,
    monitor: &dyn Monitor,
) -> Result<()> {
    let goals: Vec<String> = if cli.goals.is_empty() {
        evaluation.default_goal.iter().cloned().collect()
    } else {
        cli.goals.clone()
    };
    if goals.is_empty() {
        return Err(MakeError::NoGoal.into());
    }
    debug!(?goals, "building");

    let ctx = RunContext {
        env: &evaluation.env,
        stdlib,
        root,
        monitor,
        remapper: &evaluation.remapper,
    };
    let report = make::make(&evaluation.db, &goals, &ctx, cli.make_options())?;
    if cli.verbose {
        for line in make::summary_lines(&report.timings) {
            monitor.info(&line);
        }
    }
    if report.success() {
        if report.executed.is_empty() {
            monitor.info(&format!("nothing to be done for `{}`", goals.join(" ")));
        }
        Ok(())
    } else {
        Err(RunnerError::BuildFailed {
            failed: report.failures.len(),
            skipped: report.skipped.len(),
        }
        .into())
    }
}

fn print_data_base(db: &DataBase, json: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, db).context("cannot serialize rules")?;
        writeln!(stdout)?;
    } else {
        for rule in db.rules() {
            writeln!(stdout, "{rule}")?;
        }
    }
    stdout.flush().context("cannot write to stdout")
}

fn resolve_root(directory: Option<&Utf8Path>) -> Result<Utf8PathBuf> {
    let path = directory.unwrap_or_else(|| Utf8Path::new("."));
    path.canonicalize_utf8().map_err(|source| {
        RunnerError::Directory {
            path: path.to_owned(),
            source,
        }
        .into()
    })
}

/// Render an error for the monitor, graphically when it carries a source
/// snippet.
fn describe(err: &anyhow::Error) -> String {
    if let Some(ScriptError::Translation(diagnostic)) = err.downcast_ref::<ScriptError>() {
        return render(diagnostic.as_ref());
    }
    if let Some(diagnostic) = err.downcast_ref::<MakeError>() {
        return render(diagnostic);
    }
    format!("{err:#}")
}

fn render(diagnostic: &dyn Diagnostic) -> String {
    let mut out = String::new();
    match GraphicalReportHandler::new().render_report(&mut out, diagnostic) {
        Ok(()) => out,
        Err(_) => diagnostic.to_string(),
    }
}
