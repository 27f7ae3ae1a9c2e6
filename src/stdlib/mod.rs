//! Built-in functions callable from host statements and rule actions.
//!
//! Functions are registered by name in a [`Stdlib`] table. The default table
//! carries the output, filesystem, path, filter and program lookup
//! helpers; host programs
//! add their own with [`Stdlib::add_function`]. Relative paths passed to the
//! built-ins resolve against the run root held by [`CallContext`].

mod command;
mod filter;
mod fs;
mod path;
mod which;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::filter::{FilterError, Predicate};
use crate::monitor::Monitor;
use crate::value::Value;

pub use command::{CommandOutput, run_command};

/// Run-time context handed to every built-in.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    /// Directory relative paths resolve against.
    pub root: &'a Utf8Path,
    /// Where output and progress messages go.
    pub monitor: &'a dyn Monitor,
}

impl CallContext<'_> {
    /// Resolve a script path against the run root.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Utf8PathBuf {
        self.root.join(path)
    }
}

/// Failure reported by a built-in.
#[derive(Debug, Error)]
pub enum BuiltinError {
    /// Wrong number of arguments.
    #[error("expected {expected}, got {got} argument(s)")]
    Arity {
        /// Human-readable argument count, e.g. `"2 arguments"`.
        expected: &'static str,
        /// Number of arguments supplied.
        got: usize,
    },
    /// An argument has the wrong kind.
    #[error("argument {position} must be {expected}, found {found}")]
    Type {
        /// 1-based argument position.
        position: usize,
        /// Expected kind.
        expected: &'static str,
        /// Kind actually supplied.
        found: &'static str,
    },
    /// A filesystem operation failed.
    #[error("{path}: {source}")]
    Io {
        /// Path the operation was applied to.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// A filter argument did not compile.
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// The shell could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command line.
        command: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// A command exited unsuccessfully.
    #[error("`{command}` {}{}", describe_status(.status.as_ref()), stderr_suffix(.stderr))]
    Command {
        /// Command line.
        command: String,
        /// Exit code; `None` when killed by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// Failure raised by a host-supplied function.
    #[error("{0}")]
    Custom(String),
}

fn describe_status(status: Option<&i32>) -> String {
    status.map_or_else(
        || "terminated by signal".to_owned(),
        |code| format!("exited with status {code}"),
    )
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl BuiltinError {
    fn io(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Signature of a callable function.
pub type Function =
    Arc<dyn Fn(&CallContext<'_>, &[Value]) -> Result<Value, BuiltinError> + Send + Sync>;

/// Table of callable functions.
#[derive(Clone)]
pub struct Stdlib {
    functions: HashMap<String, Function>,
}

impl Stdlib {
    /// Table holding every built-in.
    #[must_use]
    pub fn new() -> Self {
        let mut lib = Self::empty();
        command::register(&mut lib);
        fs::register(&mut lib);
        path::register(&mut lib);
        filter::register(&mut lib);
        which::register(&mut lib);
        lib
    }

    /// Table with no functions.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register `f` under `name`, replacing any function of that name.
    pub fn add_function<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&CallContext<'_>, &[Value]) -> Result<Value, BuiltinError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    /// Look up a function.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Call `name` directly.
    ///
    /// # Errors
    ///
    /// Returns [`BuiltinError::Custom`] for an unknown name, otherwise the
    /// function's own failure.
    pub fn call(
        &self,
        ctx: &CallContext<'_>,
        name: &str,
        args: &[Value],
    ) -> Result<Value, BuiltinError> {
        let function = self
            .function(name)
            .ok_or_else(|| BuiltinError::Custom(format!("unknown function `{name}`")))?;
        function(ctx, args)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for Stdlib {
    fn default() -> Self {
        Self::new()
    }
}

fn arity(
    args: &[Value],
    min: usize,
    max: Option<usize>,
    expected: &'static str,
) -> Result<(), BuiltinError> {
    let got = args.len();
    if got < min || max.is_some_and(|max| got > max) {
        return Err(BuiltinError::Arity { expected, got });
    }
    Ok(())
}

/// A single word: text, or a list holding exactly one item.
fn text_arg(args: &[Value], index: usize) -> Result<String, BuiltinError> {
    let mismatch = |found| BuiltinError::Type {
        position: index + 1,
        expected: "text",
        found,
    };
    match args.get(index) {
        Some(Value::Text(text)) => Ok(text.clone()),
        Some(Value::List(items)) if items.len() == 1 => Ok(items.concat()),
        Some(other) => Err(mismatch(other.kind())),
        None => Err(mismatch("nothing")),
    }
}

/// Every word of every argument from `start` on.
fn words_from(args: &[Value], start: usize) -> Vec<String> {
    args.iter().skip(start).flat_map(Value::words).collect()
}

/// Coerce an argument to a predicate: text is a glob, a list an exact set.
fn filter_arg(args: &[Value], index: usize) -> Result<Predicate, BuiltinError> {
    match args.get(index) {
        Some(Value::Filter(predicate)) => Ok(predicate.clone()),
        Some(Value::Text(text)) => Ok(Predicate::glob(text)?),
        Some(Value::List(items)) => Ok(Predicate::one_of(items.iter().cloned())),
        None => Err(BuiltinError::Type {
            position: index + 1,
            expected: "filter",
            found: "nothing",
        }),
    }
}
