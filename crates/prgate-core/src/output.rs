//! CI step outputs.
//!
//! Outputs are appended to a `key=value` file (`$GITHUB_OUTPUT` on GitHub
//! Actions). Without a configured file every write is a no-op, which keeps
//! dry runs and tests free of side effects.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

const MULTILINE_DELIMITER: &str = "PRGATE_EOF";

/// Append-only CI output channel.
#[derive(Debug, Clone, Default)]
pub struct CiOutput {
    path: Option<PathBuf>,
}

impl CiOutput {
    /// Write outputs to `path`, or drop them when `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// A channel that discards everything.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one output.
    ///
    /// Values containing newlines use the `key<<DELIMITER` block form so a
    /// single output can never spill into another key.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let Some(path) = &self.path else {
            debug!(key = %key, "No CI output file configured, dropping output");
            return Ok(());
        };

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if value.contains('\n') {
            writeln!(file, "{key}<<{MULTILINE_DELIMITER}")?;
            writeln!(file, "{value}")?;
            writeln!(file, "{MULTILINE_DELIMITER}")?;
        } else {
            writeln!(file, "{key}={value}")?;
        }
        Ok(())
    }

    /// Append several outputs in order.
    pub fn set_all<'a, I>(&self, outputs: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        for (key, value) in outputs {
            self.set(key, &value)?;
        }
        Ok(())
    }
}
