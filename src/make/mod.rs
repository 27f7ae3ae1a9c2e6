//! Dependency resolution and job execution.
//!
//! [`plan`] walks the requested goals depth first and returns the stale
//! rules as a [`Plan`] in topological order. [`execute`] runs the plan,
//! either one job at a time or on a bounded worker pool, and collects the
//! outcome in a [`BuildReport`]. Action failures are localized to their job;
//! the [`Policy`] decides whether independent jobs still run.

mod cycle;
mod error;
mod parallel;
mod resolve;
mod timing;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use tracing::{debug, info, warn};

pub use error::MakeError;
pub use resolve::plan;
pub use timing::{JobTiming, format_duration, summary_lines};

use crate::monitor::Monitor;
use crate::remap::Remapper;
use crate::rule::{ActionContext, ActionError, DataBase, Rule};
use crate::stdlib::Stdlib;
use crate::value::Env;

/// What happens to pending jobs after one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    /// Start no further job.
    #[default]
    FailFast,
    /// Skip the jobs depending on the failure and run everything else.
    KeepGoing,
}

/// Execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MakeOptions {
    /// Upper bound on concurrently running jobs.
    pub jobs: usize,
    /// Failure handling.
    pub policy: Policy,
}

impl Default for MakeOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            policy: Policy::FailFast,
        }
    }
}

/// One scheduled execution of a rule's action.
#[derive(Debug, Clone)]
pub struct Job {
    /// The rule to run.
    pub rule: Arc<Rule>,
    /// Indices of earlier jobs producing this rule's sources.
    pub deps: Vec<usize>,
}

impl Job {
    /// Progress label.
    #[must_use]
    pub fn label(&self) -> String {
        self.rule.label()
    }

    /// Run the action and measure how long it took.
    fn run_timed(&self, ctx: &RunContext<'_>) -> (Result<(), ActionError>, Duration) {
        let started_at = Instant::now();
        let result = self.run(ctx);
        (result, started_at.elapsed())
    }

    fn run(&self, ctx: &RunContext<'_>) -> Result<(), ActionError> {
        let action = ActionContext {
            rule: &self.rule,
            env: ctx.env,
            stdlib: ctx.stdlib,
            root: ctx.root,
            monitor: ctx.monitor,
        };
        self.rule
            .action
            .run(&action)
            .map_err(|err| err.remap(ctx.remapper))
    }
}

/// Jobs in the order they must start.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    jobs: Vec<Job>,
}

impl Plan {
    /// Jobs in topological order.
    #[must_use]
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Number of jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether everything is up to date.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Everything a job needs besides its rule.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    /// Variables bound by the script.
    pub env: &'a Env,
    /// Functions callable from actions.
    pub stdlib: &'a Stdlib,
    /// Directory rule paths are relative to.
    pub root: &'a Utf8Path,
    /// Progress and output sink.
    pub monitor: &'a dyn Monitor,
    /// Converts action failures to script coordinates.
    pub remapper: &'a Remapper,
}

/// A job whose action failed.
#[derive(Debug, Clone)]
pub struct JobFailure {
    /// Targets of the failed rule.
    pub label: String,
    /// Failure in script coordinates.
    pub error: ActionError,
}

impl JobFailure {
    /// Multi-line message: the failure followed by its enclosing locations.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = format!("`{}` failed: {}", self.label, self.error);
        for frame in &self.error.trace {
            text.push_str(&format!("\n    from rule at {frame}"));
        }
        text
    }
}

/// Outcome of a build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Labels of jobs that succeeded, in completion order.
    pub executed: Vec<String>,
    /// Jobs that failed.
    pub failures: Vec<JobFailure>,
    /// Labels of jobs never started.
    pub skipped: Vec<String>,
    /// Duration of every job that ran, in completion order.
    pub timings: Vec<JobTiming>,
}

impl BuildReport {
    /// Whether every job ran and succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    /// Total time spent in actions.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.timings
            .iter()
            .fold(Duration::ZERO, |acc, timing| acc.saturating_add(timing.elapsed))
    }

    fn record(&mut self, job: &Job, elapsed: Duration) {
        let label = job.label();
        debug!(job = %label, elapsed = %format_duration(elapsed), "job done");
        self.timings.push(JobTiming { label, elapsed });
    }

    fn fail(&mut self, ctx: &RunContext<'_>, job: &Job, error: ActionError) {
        let failure = JobFailure {
            label: job.label(),
            error,
        };
        warn!(job = %failure.label, error = %failure.error, "job failed");
        ctx.monitor.error(&failure.describe());
        self.failures.push(failure);
    }
}

/// Resolve `goals` and run the resulting plan.
///
/// # Errors
///
/// Returns a [`MakeError`] when resolution fails; no job has run then.
/// Job failures are reported in the [`BuildReport`].
pub fn make<S: AsRef<str>>(
    db: &DataBase,
    goals: &[S],
    ctx: &RunContext<'_>,
    options: MakeOptions,
) -> Result<BuildReport, MakeError> {
    let plan = plan(db, ctx.root, goals)?;
    Ok(execute(&plan, ctx, options))
}

/// Run every job of `plan`.
#[must_use]
pub fn execute(plan: &Plan, ctx: &RunContext<'_>, options: MakeOptions) -> BuildReport {
    let report = if options.jobs > 1 && plan.len() > 1 {
        parallel::execute(plan, ctx, options)
    } else {
        execute_sequential(plan, ctx, options.policy)
    };
    ctx.monitor.finished();
    info!(
        executed = report.executed.len(),
        failed = report.failures.len(),
        skipped = report.skipped.len(),
        elapsed = %format_duration(report.total_time()),
        "build finished"
    );
    report
}

fn execute_sequential(plan: &Plan, ctx: &RunContext<'_>, policy: Policy) -> BuildReport {
    let total = plan.len();
    let mut report = BuildReport::default();
    let mut blocked: HashSet<usize> = HashSet::new();
    let mut stopped = false;
    let mut started = 0;

    for (index, job) in plan.jobs().iter().enumerate() {
        if stopped || job.deps.iter().any(|dep| blocked.contains(dep)) {
            warn!(job = %job.label(), "skipped");
            blocked.insert(index);
            report.skipped.push(job.label());
            continue;
        }
        started += 1;
        info!(job = %job.label(), "running");
        ctx.monitor.job_started(started, total, &job.label());
        let (result, elapsed) = job.run_timed(ctx);
        report.record(job, elapsed);
        match result {
            Ok(()) => report.executed.push(job.label()),
            Err(error) => {
                report.fail(ctx, job, error);
                blocked.insert(index);
                stopped = policy == Policy::FailFast;
            }
        }
    }
    report
}
