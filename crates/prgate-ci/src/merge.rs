//! Coverage profile merging.
//!
//! The merge is a structural concatenation: one header carrying the policy
//! mode, then every non-header line of every input in order. Input modes are
//! not checked against each other and statement ranges that appear in more
//! than one input are kept as separate records rather than combined. With
//! packages tested one directory at a time the inputs never overlap, so the
//! result matches what the toolchain would report for a single run.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use prgate_core::{CoverMode, PrGateError, Result};
use tracing::debug;

const MODE_PREFIX: &str = "mode:";

/// Concatenates coverage profiles under a single mode header.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageMerger {
    mode: CoverMode,
}

impl CoverageMerger {
    pub fn new(mode: CoverMode) -> Self {
        Self { mode }
    }

    /// Write `target` from `profiles`, in order.
    ///
    /// `target` must not be one of `profiles`. Any I/O failure aborts the
    /// merge; `target` may be left partially written in that case.
    pub fn merge(&self, profiles: &[PathBuf], target: &Path) -> Result<()> {
        if let Some(profile) = profiles.iter().find(|p| same_file(p, target)) {
            return Err(PrGateError::Config(format!(
                "merge target {} is also an input",
                profile.display()
            )));
        }

        let mut out = BufWriter::new(File::create(target)?);
        writeln!(out, "{}", self.mode.header())?;

        for profile in profiles {
            let reader = BufReader::new(File::open(profile)?);
            let mut records = 0usize;
            for line in reader.lines() {
                let line = line?;
                if line.starts_with(MODE_PREFIX) {
                    continue;
                }
                writeln!(out, "{line}")?;
                records += 1;
            }
            debug!(profile = %profile.display(), records, "Merged profile");
        }

        out.flush()?;
        Ok(())
    }
}

/// Whether `a` and `b` name the same file, following links when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
