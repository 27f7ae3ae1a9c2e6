//! Build script loading.
//!
//! A script is read, translated into a [`Program`] and evaluated. Evaluation
//! runs host statements in order and registers a rule at every injected
//! registration line, producing an [`Evaluation`]: the rule database, the
//! final variable environment, the default goal and the remap tables needed
//! to report later failures in script coordinates.

pub mod ast;
mod diagnostics;
pub mod eval;
mod parse;
mod translate;

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

pub use diagnostics::{ScriptError, TranslationError};
pub use eval::{EvalError, Scope};
pub use translate::{LineKind, Program, ProgramLine, Registration, translate};

use self::ast::HostStmt;
use crate::expand::Template;
use crate::monitor::Monitor;
use crate::remap::{Location, Remapper};
use crate::rule::{Action, DataBase, Rule};
use crate::stdlib::Stdlib;
use crate::value::{Env, Value};

/// Name of the variable holding the run root.
pub const TOPDIR: &str = "TOPDIR";

/// The text of a build script.
#[derive(Debug, Clone)]
pub struct Script {
    name: Utf8PathBuf,
    text: String,
}

impl Script {
    /// Read the script at `path`; diagnostics name it `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Access`] when the file cannot be read.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Result<Self, ScriptError> {
        Self::load_in(Utf8Path::new(""), path)
    }

    /// Read `file` relative to `root`; diagnostics name it `file`.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Access`] when the file cannot be read.
    pub fn load_in(root: &Utf8Path, file: impl Into<Utf8PathBuf>) -> Result<Self, ScriptError> {
        let name = file.into();
        let path = root.join(&name);
        let text = fs::read_to_string(&path).map_err(|source| ScriptError::Access {
            path: path.clone(),
            source,
        })?;
        debug!(%path, bytes = text.len(), "script loaded");
        Ok(Self { name, text })
    }

    /// A script held in memory.
    #[must_use]
    pub fn from_source(name: impl Into<Utf8PathBuf>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Name used in locations.
    #[must_use]
    pub fn name(&self) -> &Utf8Path {
        &self.name
    }

    /// Script text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Lower the script into a program.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Translation`] for malformed lines.
    pub fn translate(&self) -> Result<Program, ScriptError> {
        Ok(translate(&self.name, &self.text)?)
    }
}

/// Services available while a program is evaluated.
#[derive(Clone, Copy)]
pub struct LoadContext<'a> {
    /// Directory script paths are relative to.
    pub root: &'a Utf8Path,
    /// Functions callable from host statements.
    pub stdlib: &'a Stdlib,
    /// Output sink for `echo` and friends.
    pub monitor: &'a dyn Monitor,
}

/// Result of evaluating a program.
#[derive(Debug)]
pub struct Evaluation {
    /// Registered rules.
    pub db: DataBase,
    /// Variables as left by the last host statement.
    pub env: Env,
    /// First target of the first registered rule.
    pub default_goal: Option<String>,
    /// Remap tables of every evaluated program.
    pub remapper: Remapper,
}

impl Program {
    /// Run host statements in order and register the rules.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Eval`] located in script coordinates for the
    /// first failing statement or registration.
    pub fn eval(&self, ctx: &LoadContext<'_>) -> Result<Evaluation, ScriptError> {
        let mut remapper = Remapper::default();
        remapper.insert(self.file(), self.remap().clone());
        let mut env = Env::default();
        env.set(TOPDIR, Value::Text(ctx.root.to_string()));
        let mut db = DataBase::new();
        let mut default_goal = None;

        for line in self.lines() {
            let scope = Scope {
                env: &env,
                rule: None,
                stdlib: ctx.stdlib,
                root: ctx.root,
                monitor: ctx.monitor,
            };
            let at = |source| ScriptError::Eval {
                location: remapper.remap(&self.location(line.number)),
                source,
            };
            match &line.kind {
                LineKind::Host {
                    stmt: Some(HostStmt::Assign { name, append, value }),
                    ..
                } => {
                    let value = scope.eval(value).map_err(at)?;
                    if *append {
                        env.append(name, value);
                    } else {
                        env.set(name.clone(), value);
                    }
                }
                LineKind::Host {
                    stmt: Some(HostStmt::Call(call)),
                    ..
                } => {
                    scope.call(call).map_err(at)?;
                }
                LineKind::Register { registration, .. } => {
                    let header = Location::script(self.file(), registration.header_line);
                    let words = |template: &Template| {
                        scope
                            .template_value(template)
                            .map(|value| value.words())
                            .map_err(|source| ScriptError::Eval {
                                location: header.clone(),
                                source,
                            })
                    };
                    let targets = words(&registration.targets)?;
                    let sources = words(&registration.sources)?;
                    if default_goal.is_none() {
                        default_goal = targets.first().cloned();
                    }
                    debug!(?targets, ?sources, %header, "rule registered");
                    db.add(Rule::new(
                        targets,
                        sources,
                        header,
                        Action::Script(registration.steps.clone()),
                    ));
                }
                LineKind::Host { stmt: None, .. }
                | LineKind::Header { .. }
                | LineKind::Body { .. }
                | LineKind::Pass { .. } => {}
            }
        }

        Ok(Evaluation {
            db,
            env,
            default_goal,
            remapper,
        })
    }
}
