//! Syntax tree of host statements and rule actions.

use std::fmt;

use itertools::Itertools;

use crate::expand::Template;
use crate::remap::Location;

/// An expression in a host statement or action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Text with variable references, from a quoted string or bare words.
    Text(Template),
    /// A built-in function call.
    Call(Call),
}

/// `name(arg, ...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Function name.
    pub name: String,
    /// Arguments in call order.
    pub args: Vec<Expr>,
}

/// A statement outside rule blocks, evaluated while the script loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStmt {
    /// `NAME = EXPR` or `NAME += EXPR`.
    Assign {
        /// Variable being bound.
        name: String,
        /// Whether the value is appended (`+=`).
        append: bool,
        /// Right-hand side.
        value: Expr,
    },
    /// A call run for its effect, e.g. `echo("configuring")`.
    Call(Call),
}

/// One statement of a rule body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStmt {
    /// A built-in call such as `copy($<, $@)`.
    Call(Call),
    /// A shell command line.
    Command(Template),
}

/// An action statement tagged with its place in the translated program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// What to run.
    pub stmt: ActionStmt,
    /// Generated-program location of the statement.
    pub location: Location,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(template) => write!(f, "\"{template}\""),
            Self::Call(call) => write!(f, "{call}"),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.iter().join(", "))
    }
}
