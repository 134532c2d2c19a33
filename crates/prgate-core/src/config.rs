//! Pipeline configuration.
//!
//! Every option the pipeline recognises lives on [`PrGateConfig`]. Values are
//! layered by the binary: built-in defaults, then an optional TOML file, then
//! command-line flags (which may themselves fall back to environment
//! variables).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PrGateError, Result};

/// Coverage instrumentation mode, shared by `-covermode` and the merged
/// profile header.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CoverMode {
    Set,
    Count,
    #[default]
    Atomic,
}

impl CoverMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverMode::Set => "set",
            CoverMode::Count => "count",
            CoverMode::Atomic => "atomic",
        }
    }

    /// The profile header line for this mode, without a trailing newline.
    pub fn header(&self) -> String {
        format!("mode: {}", self.as_str())
    }
}

impl fmt::Display for CoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoverMode {
    type Err = PrGateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "set" => Ok(CoverMode::Set),
            "count" => Ok(CoverMode::Count),
            "atomic" => Ok(CoverMode::Atomic),
            other => Err(PrGateError::Config(format!(
                "unknown cover mode '{other}' (expected set, count or atomic)"
            ))),
        }
    }
}

/// Configuration for a prgate run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PrGateConfig {
    /// Base revision the working tree is diffed against.
    pub base_ref: String,

    /// Repository root; git and the test toolchain run here and package
    /// paths are resolved against it.
    pub workspace_root: PathBuf,

    /// Only changed files with this suffix are considered.
    pub extension: String,

    /// Packages whose path starts with any of these strings are skipped.
    pub exclude_prefixes: Vec<String>,

    /// Directory receiving per-package profiles, the merged profile and the
    /// run report. Relative paths are taken from `workspace_root`.
    pub output_dir: PathBuf,

    /// File name of the merged profile inside `output_dir`.
    pub merged_file: String,

    /// Coverage mode passed to the toolchain and written as merged header.
    pub cover_mode: CoverMode,

    /// File name suffix identifying test sources.
    pub test_file_suffix: String,

    /// Per-package test timeout in seconds (0 = wait forever).
    pub test_timeout_secs: u64,

    /// CI key/value output file (`$GITHUB_OUTPUT`). Unset means outputs are
    /// dropped.
    pub ci_output: Option<PathBuf>,

    /// File name of the JSON run report inside `output_dir`.
    pub report_file: String,
}

impl Default for PrGateConfig {
    fn default() -> Self {
        Self {
            base_ref: "origin/main".to_string(),
            workspace_root: PathBuf::from("."),
            extension: ".go".to_string(),
            exclude_prefixes: Vec::new(),
            output_dir: PathBuf::from("coverage"),
            merged_file: "unit-coverage.txt".to_string(),
            cover_mode: CoverMode::Atomic,
            test_file_suffix: "_test.go".to_string(),
            test_timeout_secs: 0,
            ci_output: None,
            report_file: "pr-report.json".to_string(),
        }
    }
}

impl PrGateConfig {
    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PrGateError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PrGateError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.base_ref.trim().is_empty() {
            return Err(PrGateError::Config("base_ref must not be empty".to_string()));
        }
        if self.extension.is_empty() {
            return Err(PrGateError::Config("extension must not be empty".to_string()));
        }
        if self.test_file_suffix.is_empty() {
            return Err(PrGateError::Config(
                "test_file_suffix must not be empty".to_string(),
            ));
        }
        if self.merged_file.is_empty() || self.report_file.is_empty() {
            return Err(PrGateError::Config(
                "merged_file and report_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory receiving coverage artifacts.
    pub fn coverage_dir(&self) -> PathBuf {
        self.workspace_root.join(&self.output_dir)
    }

    /// Location of the merged profile.
    pub fn merged_path(&self) -> PathBuf {
        self.coverage_dir().join(&self.merged_file)
    }

    /// Location of the JSON run report.
    pub fn report_path(&self) -> PathBuf {
        self.coverage_dir().join(&self.report_file)
    }
}

/// Split a whitespace- or comma-separated list, dropping empty items.
///
/// Used for list-valued settings that arrive as a single string from the
/// environment (`PRGATE_EXCLUDE_PREFIXES="internal/acceptance,tools"`).
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
