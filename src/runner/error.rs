//! Error types for the runner module.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised after the script was loaded successfully.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// At least one job failed or was skipped.
    #[error("build failed: {failed} job(s) failed, {skipped} skipped")]
    #[diagnostic(code(maat::runner::build_failed))]
    BuildFailed {
        /// Failed jobs.
        failed: usize,
        /// Jobs never started.
        skipped: usize,
    },
    /// `--directory` does not name a usable directory.
    #[error("cannot use {path} as the build directory: {source}")]
    #[diagnostic(code(maat::runner::directory))]
    Directory {
        /// Directory as given.
        path: camino::Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}
