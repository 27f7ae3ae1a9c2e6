//! Variable expansion for rule actions.
//!
//! A line of action text is split into literal runs and variable references
//! in a single left-to-right scan. The recognised tokens are `$@` (first
//! target), `$<` (first source), `$^` (all sources) and `$(name)`. Anything
//! else, including `$x` or an unterminated `$(`, stays literal text and is
//! left for whatever consumes the line. References are never expanded
//! recursively.
//!
//! # Examples
//!
//! ```
//! use maat::expand::{Segment, VarRef, expand};
//!
//! let template = expand("cc -o $@ $(CFLAGS) $^");
//! assert_eq!(
//!     template.segments(),
//!     &[
//!         Segment::Literal("cc -o ".into()),
//!         Segment::Var(VarRef::FirstTarget),
//!         Segment::Literal(" ".into()),
//!         Segment::Var(VarRef::Named("CFLAGS".into())),
//!         Segment::Literal(" ".into()),
//!         Segment::Var(VarRef::AllSources),
//!     ],
//! );
//! assert_eq!(template.to_string(), "cc -o $@ $(CFLAGS) $^");
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

#[expect(
    clippy::expect_used,
    reason = "the pattern is a compile-time constant"
)]
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:([@<^])|\(([^()]*)\))").expect("token pattern is valid")
});

/// A reference to a value substituted when an action runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarRef {
    /// `$@`: the first target of the rule.
    FirstTarget,
    /// `$<`: the first source of the rule.
    FirstSource,
    /// `$^`: every source, space-joined.
    AllSources,
    /// `$(name)`: a host variable looked up when the action runs.
    Named(String),
}

impl VarRef {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "@" => Some(Self::FirstTarget),
            "<" => Some(Self::FirstSource),
            "^" => Some(Self::AllSources),
            _ => None,
        }
    }

    /// Whether the reference reads the rule's targets or sources.
    #[must_use]
    pub const fn is_automatic(&self) -> bool {
        !matches!(self, Self::Named(_))
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstTarget => f.write_str("$@"),
            Self::FirstSource => f.write_str("$<"),
            Self::AllSources => f.write_str("$^"),
            Self::Named(name) => write!(f, "$({name})"),
        }
    }
}

/// One piece of an expanded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim.
    Literal(String),
    /// A reference resolved at run time.
    Var(VarRef),
}

/// A line of text with its variable references located.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Template holding `text` without looking for tokens.
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            segments: vec![Segment::Literal(text)],
        }
    }

    /// Segments in source order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the template contains no text and no references.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The reference if the template is exactly one token.
    #[must_use]
    pub fn as_single_var(&self) -> Option<&VarRef> {
        match self.segments.as_slice() {
            [Segment::Var(var)] => Some(var),
            _ => None,
        }
    }

    /// Iterate over the references in source order.
    pub fn vars(&self) -> impl Iterator<Item = &VarRef> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Var(var) => Some(var),
            Segment::Literal(_) => None,
        })
    }

    /// Append another template, merging adjacent literals.
    pub fn extend(&mut self, other: Self) {
        for seg in other.segments {
            self.push(seg);
        }
    }

    fn push(&mut self, seg: Segment) {
        match (self.segments.last_mut(), seg) {
            (_, Segment::Literal(text)) if text.is_empty() => {}
            (Some(Segment::Literal(prev)), Segment::Literal(text)) => prev.push_str(&text),
            (_, other) => self.segments.push(other),
        }
    }

    /// Render the template, resolving each reference through `resolve`.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `resolve`.
    pub fn render_with<E>(
        &self,
        mut resolve: impl FnMut(&VarRef) -> Result<String, E>,
    ) -> Result<String, E> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(var) => out.push_str(&resolve(var)?),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Var(var) => write!(f, "{var}")?,
            }
        }
        Ok(())
    }
}

/// Locate the variable references in `line`.
#[must_use]
pub fn expand(line: &str) -> Template {
    let mut template = Template::default();
    let mut last = 0;
    for caps in TOKEN_RE.captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        let var = match (caps.get(1), caps.get(2)) {
            (Some(symbol), _) => VarRef::from_symbol(symbol.as_str()),
            (None, Some(name)) => named(name.as_str()),
            (None, None) => None,
        };
        // Malformed tokens such as `$()` stay in the literal run.
        let Some(var) = var else { continue };
        if let Some(text) = line.get(last..whole.start()) {
            template.push(Segment::Literal(text.to_owned()));
        }
        template.push(Segment::Var(var));
        last = whole.end();
    }
    if let Some(rest) = line.get(last..) {
        template.push(Segment::Literal(rest.to_owned()));
    }
    template
}

fn named(raw: &str) -> Option<VarRef> {
    let name = raw.trim();
    if name.is_empty() {
        return None;
    }
    Some(VarRef::from_symbol(name).unwrap_or_else(|| VarRef::Named(name.to_owned())))
}
