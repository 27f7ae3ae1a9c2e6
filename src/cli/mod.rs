//! Command line interface definition using clap.
//!
//! Every option can also be supplied through a `MAAT_*` environment
//! variable; explicit flags take precedence.

use camino::Utf8PathBuf;
use clap::Parser;

use crate::make::{MakeOptions, Policy};

mod parsing;

use parsing::parse_jobs;

/// Maximum number of jobs accepted by the CLI.
const MAX_JOBS: usize = 64;

/// Default build script name.
pub const DEFAULT_SCRIPT: &str = "make.maat";

/// A make-style build engine driven by indentation-delimited rule scripts.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Targets to build; defaults to the first target of the first rule.
    #[arg(value_name = "GOAL")]
    pub goals: Vec<String>,

    /// Build script to read, relative to the directory.
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = DEFAULT_SCRIPT,
        env = "MAAT_FILE"
    )]
    pub file: Utf8PathBuf,

    /// Run as if started in this directory.
    ///
    /// Script lookup, rule paths and commands are all relative to it.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<Utf8PathBuf>,

    /// Print every rule instead of building.
    #[arg(short, long = "print-data-base")]
    pub print_data_base: bool,

    /// With `--print-data-base`, print the rules as JSON.
    #[arg(long, requires = "print_data_base")]
    pub json: bool,

    /// Write the translated program listing to FILE.
    #[arg(long, value_name = "FILE")]
    pub emit: Option<Utf8PathBuf>,

    /// Set the number of parallel build jobs.
    ///
    /// Values must be between 1 and 64.
    #[arg(short, long, value_name = "N", value_parser = parse_jobs, env = "MAAT_JOBS")]
    pub jobs: Option<usize>,

    /// Keep building targets that do not depend on a failed job.
    #[arg(short, long, env = "MAAT_KEEP_GOING")]
    pub keep_going: bool,

    /// Show a progress bar instead of one line per job.
    #[arg(long)]
    pub progress: bool,

    /// Enable verbose diagnostic logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Execution settings selected by the flags.
    #[must_use]
    pub fn make_options(&self) -> MakeOptions {
        MakeOptions {
            jobs: self.jobs.unwrap_or(1),
            policy: if self.keep_going {
                Policy::KeepGoing
            } else {
                Policy::FailFast
            },
        }
    }
}
