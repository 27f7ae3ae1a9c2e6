//! Path predicates for selecting file sets in build scripts.
//!
//! A [`Predicate`] is a small tree of matchers evaluated by
//! [`Predicate::accept`]. Scripts build them with the `pattern`, `regex`,
//! `one_of`, `not`, `and` and `or` built-ins; embedders can also wrap a
//! closure with [`Predicate::custom`].

use std::fmt;
use std::sync::Arc;

use camino::Utf8Path;
use itertools::Itertools;
use regex::Regex;
use thiserror::Error;

/// Errors raised while constructing a predicate.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The glob pattern could not be compiled.
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        /// Pattern as written in the script.
        pattern: String,
        /// Underlying parse failure.
        #[source]
        source: glob::PatternError,
    },
    /// The regular expression could not be compiled.
    #[error("invalid regular expression '{pattern}': {source}")]
    Regex {
        /// Expression as written in the script.
        pattern: String,
        /// Underlying parse failure.
        #[source]
        source: regex::Error,
    },
}

type CustomFn = Arc<dyn Fn(&Utf8Path) -> bool + Send + Sync>;

/// A composable test over paths.
#[derive(Clone)]
pub enum Predicate {
    /// Accepts every path.
    Always,
    /// Rejects every path.
    Never,
    /// Accepts paths equal to one of the listed entries.
    List(Vec<String>),
    /// Shell-style file name pattern (`*`, `?`, `[...]`).
    Glob(glob::Pattern),
    /// Regular expression anchored at the start of the path.
    Regex(Regex),
    /// A native test supplied by the embedding program.
    Custom(CustomFn),
    /// Negation of the inner predicate.
    Not(Box<Predicate>),
    /// Accepts when every inner predicate accepts.
    And(Vec<Predicate>),
    /// Accepts when any inner predicate accepts.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Build a [`Predicate::Glob`].
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Glob`] when `pattern` is malformed.
    pub fn glob(pattern: &str) -> Result<Self, FilterError> {
        glob::Pattern::new(pattern)
            .map(Self::Glob)
            .map_err(|source| FilterError::Glob {
                pattern: pattern.to_owned(),
                source,
            })
    }

    /// Build a [`Predicate::Regex`] matching from the start of the path.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Regex`] when `pattern` is malformed.
    pub fn regex(pattern: &str) -> Result<Self, FilterError> {
        Regex::new(&format!("^(?:{pattern})"))
            .map(Self::Regex)
            .map_err(|source| FilterError::Regex {
                pattern: pattern.to_owned(),
                source,
            })
    }

    /// Build a [`Predicate::List`].
    #[must_use]
    pub fn one_of<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Wrap a closure as a [`Predicate::Custom`].
    #[must_use]
    pub fn custom(f: impl Fn(&Utf8Path) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Negate `self`.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Whether `path` satisfies the predicate.
    #[must_use]
    pub fn accept(&self, path: &Utf8Path) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::List(items) => items.iter().any(|item| item == path.as_str()),
            Self::Glob(pattern) => pattern.matches(path.as_str()),
            Self::Regex(re) => re.is_match(path.as_str()),
            Self::Custom(f) => f(path),
            Self::Not(inner) => !inner.accept(path),
            Self::And(all) => all.iter().all(|p| p.accept(path)),
            Self::Or(any) => any.iter().any(|p| p.accept(path)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("true"),
            Self::Never => f.write_str("false"),
            Self::List(items) => write!(f, "one of [{}]", items.iter().join(", ")),
            Self::Glob(pattern) => f.write_str(pattern.as_str()),
            Self::Regex(re) => write!(f, "/{}/", re.as_str()),
            Self::Custom(_) => f.write_str("fun"),
            Self::Not(inner) => write!(f, "not {inner}"),
            Self::And(all) => write!(f, "({})", all.iter().join(" and ")),
            Self::Or(any) => write!(f, "({})", any.iter().join(" or ")),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({self})")
    }
}
