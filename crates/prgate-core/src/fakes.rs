//! In-memory fakes for the capability traits (testing only)
//!
//! Provides `ScriptedRunner` and `MemoryInspector` so the pipeline can be
//! exercised without spawning processes or touching the filesystem.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{PrGateError, Result};
use crate::inspect::DirectoryInspector;

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

type Responder = Box<dyn Fn(&CommandSpec) -> Result<CommandOutput> + Send + Sync>;

/// Command runner that answers from a closure and records every call.
pub struct ScriptedRunner {
    responder: Responder,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command succeeds with the given stdout.
    pub fn succeeding(stdout: &str) -> Self {
        let stdout = stdout.to_string();
        Self::new(move |_| Ok(output(0, &stdout)))
    }

    /// Every command exits with `exit_code` and the given stderr.
    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        Self::new(move |_| {
            Ok(CommandOutput {
                exit_code,
                stdout: String::new(),
                stderr: stderr.clone(),
                duration_ms: 0,
            })
        })
    }

    /// Every command fails to spawn.
    pub fn unspawnable() -> Self {
        Self::new(|spec| {
            Err(PrGateError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            })
        })
    }

    /// Commands received so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.responder)(spec)
    }
}

/// Build a finished command output with empty stderr.
pub fn output(exit_code: i32, stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration_ms: 0,
    }
}

// ---------------------------------------------------------------------------
// MemoryInspector
// ---------------------------------------------------------------------------

/// Directory inspector over an in-memory tree of `dir -> file names`.
#[derive(Debug, Default)]
pub struct MemoryInspector {
    dirs: BTreeMap<PathBuf, BTreeSet<String>>,
}

impl MemoryInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory containing `files`.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>, files: &[&str]) -> Self {
        self.dirs
            .entry(dir.into())
            .or_default()
            .extend(files.iter().map(|f| f.to_string()));
        self
    }
}

impl DirectoryInspector for MemoryInspector {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains_key(path)
    }

    fn has_entry_with_suffix(&self, dir: &Path, suffix: &str) -> Result<bool> {
        let files = self.dirs.get(dir).ok_or_else(|| {
            PrGateError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", dir.display()),
            ))
        })?;
        Ok(files.iter().any(|f| f.ends_with(suffix)))
    }
}
