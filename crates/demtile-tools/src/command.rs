//! Command lines, runners and the shared invocation policy.

use crate::{Result, ToolError};
use demtile_metrics::metric_defs;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name without directories, used as a metric label.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// A successful run with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a command to completion and captures its output.
///
/// Implementations only report whether the process could be run; exit status
/// policy lives in [`invoke`].
pub trait ToolRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .map_err(|source| ToolError::Spawn {
                program: command.program.display().to_string(),
                source,
            })?;

        Ok(ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `command` and fail unless it exits with status zero.
pub fn invoke(runner: &dyn ToolRunner, command: &ToolCommand) -> Result<ToolOutput> {
    let labels = [("program", command.program_name())];
    metrics::counter!(metric_defs::TOOL_INVOCATIONS.name, &labels).increment(1);
    debug!("Running {}", command);

    let output = match runner.run(command) {
        Ok(output) => output,
        Err(e) => {
            metrics::counter!(metric_defs::TOOL_FAILURES.name, &labels).increment(1);
            return Err(e);
        }
    };

    if !output.is_success() {
        metrics::counter!(metric_defs::TOOL_FAILURES.name, &labels).increment(1);
        return Err(ToolError::InvocationFailed {
            command: command.to_string(),
            code: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output)
}

/// Resolve a program name or path to an executable.
pub fn locate(program: &Path) -> Result<PathBuf> {
    which::which(program).map_err(|source| ToolError::NotFound {
        program: program.display().to_string(),
        source,
    })
}
