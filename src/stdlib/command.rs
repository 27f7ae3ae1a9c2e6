//! Output and shell helpers.
//!
//! `echo` prints through the monitor. `shell` runs a command line with the
//! platform shell in the run root and yields its trimmed standard output;
//! rule body command lines go through [`run_command`] as well.
//!
//! # Security
//!
//! Commands come straight from the build script. Only run scripts from
//! trusted sources.

use std::process::{Command, Stdio};

use camino::Utf8Path;
use tracing::debug;

use itertools::Itertools;

use super::{BuiltinError, CallContext, Stdlib, arity};
use crate::value::Value;

#[cfg(windows)]
const SHELL: &str = "cmd";
#[cfg(windows)]
const SHELL_ARGS: &[&str] = &["/C"];

#[cfg(not(windows))]
const SHELL: &str = "sh";
#[cfg(not(windows))]
const SHELL_ARGS: &[&str] = &["-c"];

pub(super) fn register(lib: &mut Stdlib) {
    lib.add_function("echo", |ctx, args| {
        let line = args.iter().map(ToString::to_string).join(" ");
        ctx.monitor.print(&line);
        Ok(Value::unit())
    });
    lib.add_function("shell", shell);
}

fn shell(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    arity(args, 1, None, "at least 1 argument")?;
    let command = args.iter().map(ToString::to_string).join(" ");
    ctx.monitor.info(&command);
    let output = run_command(ctx.root, &command)?;
    Ok(Value::Text(output.stdout.trim_end().to_owned()))
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// Run `command` through the platform shell with `root` as working directory.
///
/// # Errors
///
/// Returns [`BuiltinError::Spawn`] when the shell cannot start and
/// [`BuiltinError::Command`] when the command exits unsuccessfully.
pub fn run_command(root: &Utf8Path, command: &str) -> Result<CommandOutput, BuiltinError> {
    debug!(%command, %root, "running command");
    let mut cmd = Command::new(SHELL);
    cmd.args(SHELL_ARGS)
        .arg(command)
        .current_dir(root)
        .stdin(Stdio::null());
    let output = cmd.output().map_err(|source| BuiltinError::Spawn {
        command: command.to_owned(),
        source,
    })?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if output.status.success() {
        Ok(CommandOutput { stdout, stderr })
    } else {
        Err(BuiltinError::Command {
            command: command.to_owned(),
            status: output.status.code(),
            stderr,
        })
    }
}
