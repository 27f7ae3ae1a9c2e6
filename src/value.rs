//! Host values and the variable environment shared by scripts and actions.

use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::filter::Predicate;

/// A value produced by a host expression.
#[derive(Debug, Clone)]
pub enum Value {
    /// Plain text.
    Text(String),
    /// An ordered list of words, usually paths.
    List(Vec<String>),
    /// A path predicate built with the filter helpers.
    Filter(Predicate),
}

impl Value {
    /// The empty text value returned by statement-like built-ins.
    #[must_use]
    pub const fn unit() -> Self {
        Self::Text(String::new())
    }

    /// Words of the value: lists as-is, text split on whitespace.
    #[must_use]
    pub fn words(&self) -> Vec<String> {
        match self {
            Self::Text(text) => text.split_whitespace().map(str::to_owned).collect(),
            Self::List(items) => items.clone(),
            Self::Filter(predicate) => vec![predicate.to_string()],
        }
    }

    /// Append `other`, producing a list.
    #[must_use]
    pub fn append(self, other: Self) -> Self {
        let mut items = self.words();
        items.extend(other.words());
        Self::List(items)
    }

    /// Name of the variant for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Filter(_) => "filter",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::List(items) => write!(f, "{}", items.iter().join(" ")),
            Self::Filter(predicate) => write!(f, "{predicate}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Predicate> for Value {
    fn from(value: Predicate) -> Self {
        Self::Filter(value)
    }
}

/// Variables bound by host statements, in binding order.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: IndexMap<String, Value>,
}

impl Env {
    /// Bind `name`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Append `value` to `name`; an unbound name starts from an empty list.
    pub fn append(&mut self, name: &str, value: Value) {
        let slot = self
            .vars
            .entry(name.to_owned())
            .or_insert_with(|| Value::List(Vec::new()));
        let current = std::mem::replace(slot, Value::unit());
        *slot = current.append(value);
    }

    /// Look up `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Iterate over bindings in the order they were first made.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }
}
