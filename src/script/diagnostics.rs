//! Turns script problems into actionable diagnostics.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use super::eval::EvalError;
use crate::remap::Location;

const HINTS: &[(&str, &str)] = &[
    (
        "expected an assignment",
        "rule headers need a `:`; host statements are `NAME = value` or `func(args)`",
    ),
    ("unclosed `(`", "close the call with `)` on the same line"),
    ("unterminated string", "add the closing `\"`"),
    (
        "automatic variable",
        "`$@`, `$<` and `$^` are only available inside rule bodies",
    ),
];

fn hint_for(message: &str) -> Option<String> {
    HINTS
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, hint)| (*hint).to_owned())
}

/// A malformed host statement, rule header or rule body line.
#[derive(Debug, Error, Diagnostic)]
#[error("{location}: {message}")]
#[diagnostic(code(maat::script::syntax))]
pub struct TranslationError {
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    /// Script line of the malformed construct.
    pub location: Location,
    /// What is wrong with it.
    pub message: String,
}

impl TranslationError {
    /// Error on script `line`, spanning `len` bytes from byte `offset` of
    /// the whole `source`.
    pub(crate) fn new(
        file: &Utf8Path,
        source: &str,
        line: usize,
        offset: usize,
        len: usize,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            src: NamedSource::new(file.as_str(), source.to_owned()),
            span: SourceSpan::new(offset.into(), len),
            help: hint_for(&message),
            location: Location::script(file, line),
            message,
        }
    }

    /// Suggested fix, if one is known.
    #[must_use]
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }
}

/// Errors raised while loading a build script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script is missing or unreadable.
    #[error("cannot read build script {path}: {source}")]
    Access {
        /// Path that was opened.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The script is malformed.
    #[error(transparent)]
    Translation(#[from] Box<TranslationError>),
    /// A host statement failed while the script was evaluated.
    #[error("{location}: {source}")]
    Eval {
        /// Script line of the statement.
        location: Location,
        /// What failed.
        #[source]
        source: EvalError,
    },
}
