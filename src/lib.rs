//! Maat core library.
//!
//! Maat reads a build script mixing host statements with indentation
//! delimited rule blocks, translates it into a numbered program, evaluates
//! that program into a rule database and brings the requested goals up to
//! date by running the stale rules in dependency order.
//!
//! ```
//! use camino::Utf8Path;
//! use maat::monitor::RecordingMonitor;
//! use maat::script::{LoadContext, Script};
//! use maat::stdlib::Stdlib;
//!
//! let script = Script::from_source("make.maat", "app: main.o\n\tcc -o $@ $^\n");
//! let monitor = RecordingMonitor::new();
//! let stdlib = Stdlib::new();
//! let ctx = LoadContext { root: Utf8Path::new("."), stdlib: &stdlib, monitor: &monitor };
//! let evaluation = script.translate()?.eval(&ctx)?;
//! assert_eq!(evaluation.default_goal.as_deref(), Some("app"));
//! # Ok::<(), maat::script::ScriptError>(())
//! ```

pub mod cli;
pub mod expand;
pub mod filter;
pub mod make;
pub mod monitor;
pub mod path;
pub mod remap;
pub mod rule;
pub mod runner;
pub mod script;
pub mod stdlib;
pub mod value;
