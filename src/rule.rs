//! Rules, their actions and the rule database.
//!
//! A [`Rule`] names the targets it produces and the sources it reads, and
//! owns an [`Action`]. Script actions are the statements of a rule block;
//! native actions are Rust closures registered through [`DataBase::rule`].
//! The [`DataBase`] keeps every rule in registration order plus an index
//! from target name to the rule that currently produces it.

use std::fmt;
use std::io;
use std::panic::Location as CallerLocation;
use std::sync::Arc;
use std::time::SystemTime;

use camino::Utf8Path;
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::monitor::Monitor;
use crate::path::BuildPath;
use crate::remap::{Location, Remapper};
use crate::script::ast::{ActionStmt, Step};
use crate::script::eval::Scope;
use crate::stdlib::{Stdlib, run_command};
use crate::value::Env;

/// Everything an action can see while it runs.
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    /// The rule being built.
    pub rule: &'a Rule,
    /// Variables bound by the script.
    pub env: &'a Env,
    /// Functions callable from the action.
    pub stdlib: &'a Stdlib,
    /// Directory rule paths are relative to.
    pub root: &'a Utf8Path,
    /// Progress and output sink.
    pub monitor: &'a dyn Monitor,
}

type NativeFn = Arc<dyn Fn(&ActionContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// The behaviour bound to a rule.
#[derive(Clone)]
pub enum Action {
    /// Statements of a rule block, each tagged with its program location.
    Script(Arc<[Step]>),
    /// A closure supplied by the embedding program.
    Native(NativeFn),
}

impl Action {
    /// An action that does nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::Script(Arc::from(Vec::new()))
    }

    /// Wrap a closure.
    #[must_use]
    pub fn native(
        f: impl Fn(&ActionContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::Native(Arc::new(f))
    }

    /// Run the action for `ctx.rule`.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] locating the failing statement. Script
    /// failures are located in program coordinates; pass the error through
    /// [`ActionError::remap`] before showing it.
    pub fn run(&self, ctx: &ActionContext<'_>) -> Result<(), ActionError> {
        match self {
            Self::Script(steps) => steps.iter().try_for_each(|step| run_step(ctx, step)),
            Self::Native(f) => f(ctx).map_err(|err| ActionError {
                message: format!("{err:#}"),
                location: ctx.rule.location.clone(),
                trace: Vec::new(),
            }),
        }
    }
}

fn run_step(ctx: &ActionContext<'_>, step: &Step) -> Result<(), ActionError> {
    let scope = Scope {
        env: ctx.env,
        rule: Some(ctx.rule),
        stdlib: ctx.stdlib,
        root: ctx.root,
        monitor: ctx.monitor,
    };
    let fail = |message: String| ActionError {
        message,
        location: step.location.clone(),
        trace: vec![ctx.rule.location.clone()],
    };
    match &step.stmt {
        ActionStmt::Call(call) => {
            scope.call(call).map_err(|err| fail(err.to_string()))?;
        }
        ActionStmt::Command(template) => {
            let command = scope
                .render_command(template)
                .map_err(|err| fail(err.to_string()))?;
            ctx.monitor.info(&command);
            let output = run_command(ctx.root, &command).map_err(|err| fail(err.to_string()))?;
            for text in [&output.stdout, &output.stderr] {
                let text = text.trim_end();
                if !text.is_empty() {
                    ctx.monitor.print(text);
                }
            }
        }
    }
    Ok(())
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(steps) => write!(f, "Script({} steps)", steps.len()),
            Self::Native(_) => f.write_str("Native"),
        }
    }
}

/// A failed action.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("{location}: {message}")]
#[diagnostic(code(maat::make::action))]
pub struct ActionError {
    /// What went wrong.
    pub message: String,
    /// The failing statement, or the rule for native actions.
    pub location: Location,
    /// Enclosing locations, innermost first; ends with the rule header.
    pub trace: Vec<Location>,
}

impl ActionError {
    /// Express the location and every trace frame in script coordinates.
    #[must_use]
    pub fn remap(self, remapper: &Remapper) -> Self {
        Self {
            location: remapper.remap(&self.location),
            trace: remapper.remap_trace(&self.trace),
            message: self.message,
        }
    }
}

/// A build rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Files produced, in declaration order.
    pub targets: Vec<String>,
    /// Files read, in declaration order.
    pub sources: Vec<String>,
    /// Where the rule was declared.
    pub location: Location,
    /// How the targets are produced.
    pub action: Action,
}

impl Rule {
    /// Construct a rule.
    #[must_use]
    pub const fn new(
        targets: Vec<String>,
        sources: Vec<String>,
        location: Location,
        action: Action,
    ) -> Self {
        Self {
            targets,
            sources,
            location,
            action,
        }
    }

    /// Short name for progress output: the targets, space-joined.
    #[must_use]
    pub fn label(&self) -> String {
        self.targets.join(" ")
    }

    /// Whether the targets are out of date with respect to the sources.
    ///
    /// A rule needs an update when it has no targets, when a target or a
    /// source is missing, or when a source is newer than the oldest target.
    ///
    /// # Errors
    ///
    /// Returns I/O errors other than "not found" raised while reading
    /// modification times.
    pub fn needs_update(&self, root: &Utf8Path) -> io::Result<bool> {
        let mut oldest: Option<SystemTime> = None;
        for target in &self.targets {
            let Some(time) = BuildPath::from(root.join(target)).modified()? else {
                debug!(%target, "target missing");
                return Ok(true);
            };
            oldest = Some(oldest.map_or(time, |old| old.min(time)));
        }
        let Some(oldest) = oldest else {
            return Ok(true);
        };
        for source in &self.sources {
            match BuildPath::from(root.join(source)).modified()? {
                None => {
                    debug!(%source, "source missing");
                    return Ok(true);
                }
                Some(time) if time > oldest => {
                    debug!(%source, "source newer than targets");
                    return Ok(true);
                }
                Some(_) => {}
            }
        }
        Ok(false)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}\n\tcode {}",
            self.targets.join(" "),
            self.sources.join(" "),
            self.location
        )
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Rule", 4)?;
        state.serialize_field("targets", &self.targets)?;
        state.serialize_field("sources", &self.sources)?;
        state.serialize_field("file", &self.location.file)?;
        state.serialize_field("line", &self.location.line)?;
        state.end()
    }
}

/// Every known rule plus the target index.
#[derive(Debug, Clone, Default)]
pub struct DataBase {
    rules: Vec<Arc<Rule>>,
    index: IndexMap<String, Arc<Rule>>,
}

impl DataBase {
    /// Construct an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rule`; each of its targets now maps to it.
    pub fn add(&mut self, rule: Rule) -> Arc<Rule> {
        let rule = Arc::new(rule);
        for target in &rule.targets {
            if let Some(previous) = self.index.insert(target.clone(), Arc::clone(&rule)) {
                debug!(%target, previous = %previous.location, "target redefined");
            }
        }
        self.rules.push(Arc::clone(&rule));
        rule
    }

    /// Rule producing `target`, if any.
    #[must_use]
    pub fn rule_for(&self, target: &str) -> Option<&Arc<Rule>> {
        self.index.get(target)
    }

    /// Rules in registration order, overridden ones included.
    #[must_use]
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rule was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Start declaring a rule with a native action.
    ///
    /// ```
    /// use maat::rule::DataBase;
    ///
    /// let mut db = DataBase::new();
    /// db.rule(["version.txt"], [] as [&str; 0])
    ///     .action(|ctx| Ok(std::fs::write(ctx.root.join("version.txt"), "1.0")?));
    /// assert!(db.rule_for("version.txt").is_some());
    /// ```
    pub fn rule<T, S>(
        &mut self,
        targets: impl IntoIterator<Item = T>,
        sources: impl IntoIterator<Item = S>,
    ) -> RuleBuilder<'_>
    where
        T: Into<String>,
        S: Into<String>,
    {
        RuleBuilder {
            db: self,
            targets: targets.into_iter().map(Into::into).collect(),
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }
}

impl Serialize for DataBase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rules.iter().map(AsRef::<Rule>::as_ref))
    }
}

/// Pending native rule; see [`DataBase::rule`].
pub struct RuleBuilder<'a> {
    db: &'a mut DataBase,
    targets: Vec<String>,
    sources: Vec<String>,
}

impl RuleBuilder<'_> {
    /// Bind `f` as the action and register the rule, located at the caller.
    #[track_caller]
    pub fn action(
        self,
        f: impl Fn(&ActionContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Arc<Rule> {
        let caller = CallerLocation::caller();
        let line = usize::try_from(caller.line()).unwrap_or(usize::MAX);
        let location = Location::script(caller.file(), line);
        self.db
            .add(Rule::new(self.targets, self.sources, location, Action::native(f)))
    }
}
