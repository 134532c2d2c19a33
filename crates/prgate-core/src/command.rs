//! External command execution.
//!
//! Everything prgate shells out to (git, the test toolchain) goes through the
//! [`CommandRunner`] trait so the pipeline can be driven by a scripted fake in
//! tests. [`ProcessRunner`] is the real implementation.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{PrGateError, Result};

/// A command to execute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,

    /// Arguments, not including the program.
    pub args: Vec<String>,

    /// Working directory (inherits the caller's when unset).
    pub current_dir: Option<PathBuf>,

    /// Stream stdout/stderr to the operator instead of capturing them.
    pub stream: bool,

    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,
}

impl CommandSpec {
    /// Create a captured command with no timeout.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current_dir: None,
            stream: false,
            timeout_secs: 0,
        }
    }

    /// Run in the given directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Stream output through to the operator.
    pub fn streamed(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Abort the command after `timeout_secs` seconds (0 disables).
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// The full command line, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (-1 when the process was terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout (empty when streamed).
    pub stdout: String,

    /// Captured stderr (empty when streamed).
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability to run external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion.
    ///
    /// A non-zero exit is reported through [`CommandOutput::exit_code`], not as
    /// an error. Errors are reserved for commands that could not be started
    /// or did not finish in time.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let start = Instant::now();
        debug!(command = %spec.display(), "spawning");

        let mut command = Command::new(&spec.program);
        command.args(&spec.args).kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }
        if spec.stream {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let child = command.spawn().map_err(|source| PrGateError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let output = if spec.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(spec.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| PrGateError::Timeout {
                program: spec.display(),
                timeout_secs: spec.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
