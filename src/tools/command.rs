// src/tools/command.rs

//! External tool gateway
//!
//! A [`ToolCommand`] is a program plus arguments. A [`CommandRunner`] runs it
//! and reports an [`ExecutionResult`]: the literal command line, combined
//! output, success flag and elapsed time. Runners never interpret output;
//! callers decide what failure means.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Program and arguments of one external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path, made absolute
    pub fn path(self, path: &Path) -> Self {
        let path = absolute(path);
        self.arg(path)
    }

    /// Append `key value`
    pub fn option(self, key: &str, value: impl Into<String>) -> Self {
        self.arg(key).arg(value)
    }

    /// Append `key <absolute path>`
    pub fn option_path(self, key: &str, path: &Path) -> Self {
        self.arg(key).path(path)
    }

    /// Run this command through another program, e.g. `cmd /C`
    pub fn wrapped_in(self, program: impl Into<PathBuf>, prefix: &[&str]) -> Self {
        let mut args: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
        args.push(self.program.display().to_string());
        args.extend(self.args);
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Program file name, used as a short label in logs
    pub fn name(&self) -> String {
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
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Outcome of one external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Literal command line
    pub command: String,
    /// stdout followed by stderr
    pub output: String,
    pub success: bool,
    /// None when the process could not be started or was killed by a signal
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    /// Log and convert a failed invocation into an error
    ///
    /// `label` names the step in the log, e.g. `"Decompile"`.
    pub fn check(self, label: &str) -> Result<Self> {
        if self.success {
            debug!("{} complete after {}", label, format_duration(self.elapsed));
            Ok(self)
        } else {
            warn!("Command {} failed:", self.command);
            for line in self.lines() {
                warn!("  {}", line);
            }
            Err(Error::ToolFailed {
                command: self.command,
                output: self.output,
            })
        }
    }
}

/// Runs external commands
///
/// The pipeline only talks to tools through this trait, so tests can swap in
/// a recording fake.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> ExecutionResult;
}

/// Spawns real processes and waits for them
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand) -> ExecutionResult {
        let line = command.to_string();
        debug!("Sending '{}'", line);

        let start = Instant::now();
        let output = Command::new(command.program())
            .args(command.get_args())
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                ExecutionResult {
                    command: line,
                    output: text,
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    elapsed: start.elapsed(),
                }
            }
            Err(e) => ExecutionResult {
                output: format!("Failed to start {}: {}", command.program().display(), e),
                command: line,
                success: false,
                exit_code: None,
                elapsed: start.elapsed(),
            },
        }
    }
}

/// Seconds with one decimal, e.g. `12.3s`
pub fn format_duration(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}
