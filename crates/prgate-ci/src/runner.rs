//! Per-package coverage execution.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use prgate_core::{CommandRunner, CoverMode, PrGateConfig, PrGateError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::merge::CoverageMerger;
use crate::stage::TestInvocation;

/// Coverage profile produced by one package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageArtifact {
    pub package: String,
    pub path: PathBuf,
    pub duration_ms: u64,
}

/// Outcome of running every package's tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageRun {
    /// Merged profile location. The file only exists when `merged` is true.
    pub merged_path: PathBuf,

    /// Whether the merged profile was written.
    pub merged: bool,

    /// Profiles produced, in invocation order.
    pub artifacts: Vec<PackageArtifact>,

    /// Packages whose tests passed without producing a profile.
    pub missing_artifacts: Vec<String>,
}

/// Runs each package's tests with coverage and merges the profiles.
///
/// Packages run one at a time in the order given. The first failing package
/// aborts the run: later packages are not attempted and no merged profile is
/// written.
pub struct CoverageRunner {
    runner: Arc<dyn CommandRunner>,
    workspace_root: PathBuf,
    cover_mode: CoverMode,
    timeout_secs: u64,
    merged_file: String,
}

impl CoverageRunner {
    pub fn new(runner: Arc<dyn CommandRunner>, workspace_root: impl Into<PathBuf>) -> Self {
        let defaults = PrGateConfig::default();
        Self {
            runner,
            workspace_root: workspace_root.into(),
            cover_mode: defaults.cover_mode,
            timeout_secs: defaults.test_timeout_secs,
            merged_file: defaults.merged_file,
        }
    }

    pub fn from_config(runner: Arc<dyn CommandRunner>, config: &PrGateConfig) -> Self {
        Self {
            runner,
            workspace_root: config.workspace_root.clone(),
            cover_mode: config.cover_mode,
            timeout_secs: config.test_timeout_secs,
            merged_file: config.merged_file.clone(),
        }
    }

    pub fn with_cover_mode(mut self, cover_mode: CoverMode) -> Self {
        self.cover_mode = cover_mode;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Test `packages` in order, writing profiles into `output_dir`.
    pub async fn run_tests(&self, packages: &[String], output_dir: &Path) -> Result<CoverageRun> {
        tokio::fs::create_dir_all(output_dir).await?;
        // Profiles are passed as absolute paths; the toolchain runs from the
        // workspace root, not from the caller's directory.
        let output_dir = tokio::fs::canonicalize(output_dir).await?;
        let merged_path = output_dir.join(&self.merged_file);
        remove_stale(&merged_path).await?;

        info!(packages = packages.len(), "Running unit tests with coverage");

        let mut artifacts = Vec::new();
        let mut missing_artifacts = Vec::new();
        let mut claimed = HashSet::new();
        let total = packages.len();

        for (idx, package) in packages.iter().enumerate() {
            let mut invocation =
                TestInvocation::new(package, &output_dir, self.cover_mode, self.timeout_secs);
            if claimed.contains(&invocation.artifact) {
                invocation.artifact = unclaimed_artifact(&invocation.artifact, &claimed);
                debug!(
                    package = %package,
                    artifact = %invocation.artifact.display(),
                    "Artifact name already taken in this run"
                );
            }
            claimed.insert(invocation.artifact.clone());
            remove_stale(&invocation.artifact).await?;

            info!("[{}/{}] Testing: {}", idx + 1, total, package);
            let output = self
                .runner
                .run(&invocation.to_command_spec(&self.workspace_root))
                .await?;

            if !output.success() {
                return Err(PrGateError::TestExecution {
                    package: package.clone(),
                    exit_code: output.exit_code,
                });
            }

            if tokio::fs::try_exists(&invocation.artifact).await? {
                info!(package = %package, "Coverage generated");
                artifacts.push(PackageArtifact {
                    package: package.clone(),
                    path: invocation.artifact,
                    duration_ms: output.duration_ms,
                });
            } else {
                warn!(package = %package, "No coverage file produced");
                missing_artifacts.push(package.clone());
            }
        }

        let merged = !artifacts.is_empty();
        if merged {
            info!(profiles = artifacts.len(), "Merging coverage files");
            let paths: Vec<PathBuf> = artifacts.iter().map(|a| a.path.clone()).collect();
            CoverageMerger::new(self.cover_mode).merge(&paths, &merged_path)?;
            info!(path = %merged_path.display(), "Merged coverage file written");
        }

        Ok(CoverageRun {
            merged_path,
            merged,
            artifacts,
            missing_artifacts,
        })
    }
}

/// First free `<stem>.<n>.out` next to `artifact`.
///
/// Package-derived names never contain a dot before `.out`, so these cannot
/// collide with another package's natural name.
fn unclaimed_artifact(artifact: &Path, claimed: &HashSet<PathBuf>) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (2..)
        .map(|n| artifact.with_file_name(format!("{stem}.{n}.out")))
        .find(|candidate| !claimed.contains(candidate))
        .unwrap_or_else(|| artifact.to_path_buf())
}

/// Remove a file left behind by an earlier run so a package (or a run) that
/// produces nothing this time is not credited with old data.
async fn remove_stale(artifact: &Path) -> Result<()> {
    match tokio::fs::remove_file(artifact).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
