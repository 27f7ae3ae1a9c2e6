//! Errors raised while resolving goals into jobs.

use std::io;

use miette::Diagnostic;
use thiserror::Error;

use crate::remap::Location;

/// Resolution failures. Any of them aborts the run before a job starts.
#[derive(Debug, Error, Diagnostic)]
pub enum MakeError {
    /// Neither a rule nor an existing file provides the goal.
    #[error("no way to build `{goal}`{}", needed_by_suffix(.needed_by.as_deref()))]
    #[diagnostic(
        code(maat::make::no_rule),
        help("add a rule listing it as a target, or create the file")
    )]
    NoRule {
        /// The unbuildable name.
        goal: String,
        /// The target whose rule lists it as a source, if any.
        needed_by: Option<String>,
    },
    /// Targets depend on themselves.
    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    #[diagnostic(code(maat::make::cycle))]
    Cycle {
        /// The cycle, starting and ending at its smallest name.
        cycle: Vec<String>,
    },
    /// Nothing was requested and the script registers no rule.
    #[error("no goal given and no rule registered")]
    #[diagnostic(code(maat::make::no_goal))]
    NoGoal,
    /// A modification time could not be read.
    #[error("{location}: cannot check whether the rule is up to date: {source}")]
    #[diagnostic(code(maat::make::stat))]
    Stat {
        /// The rule being checked.
        location: Location,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}

fn needed_by_suffix(needed_by: Option<&str>) -> String {
    needed_by
        .map(|target| format!(" (needed by `{target}`)"))
        .unwrap_or_default()
}
