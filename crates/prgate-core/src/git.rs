//! Change-set resolution against a base revision.
//!
//! The diff is taken with `git diff --name-only <base>...HEAD`, i.e. against
//! the merge base, so commits that landed on the base branch after the PR
//! forked do not show up as changes.
//!
//! Files at the repository root have no package directory and are dropped
//! from the package set. Root-level sources are therefore never tested or
//! gated by prgate; this is intended and callers should not expect them.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::PrGateConfig;
use crate::error::{PrGateError, Result};

/// Resolves the files and packages changed relative to a base revision.
pub struct ChangeSetResolver {
    runner: Arc<dyn CommandRunner>,
    workspace_root: PathBuf,
    extension: String,
}

impl ChangeSetResolver {
    /// Create a resolver that runs git in `workspace_root` and keeps files
    /// ending in `extension` when resolving packages.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        workspace_root: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            workspace_root: workspace_root.into(),
            extension: extension.into(),
        }
    }

    /// Create a resolver from the pipeline configuration.
    pub fn from_config(runner: Arc<dyn CommandRunner>, config: &PrGateConfig) -> Self {
        Self::new(runner, config.workspace_root.clone(), config.extension.clone())
    }

    /// Changed files ending in `extension`, in diff order.
    ///
    /// Paths are trimmed and empty lines are dropped. A failing diff is fatal.
    pub async fn resolve_changed_files(
        &self,
        base_ref: &str,
        extension: &str,
    ) -> Result<Vec<String>> {
        let spec = CommandSpec::new(
            "git",
            vec![
                "diff".to_string(),
                "--name-only".to_string(),
                format!("{base_ref}...HEAD"),
            ],
        )
        .in_dir(&self.workspace_root);

        let output = self.runner.run(&spec).await.map_err(|e| PrGateError::Diff {
            base_ref: base_ref.to_string(),
            message: e.to_string(),
        })?;

        if !output.success() {
            return Err(PrGateError::Diff {
                base_ref: base_ref.to_string(),
                message: format!(
                    "exit code {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }

        Ok(filter_by_extension(&output.stdout, extension))
    }

    /// Sorted, duplicate-free package directories touched by the change set.
    pub async fn resolve_changed_packages(
        &self,
        base_ref: &str,
        exclude_prefixes: &[String],
    ) -> Result<Vec<String>> {
        let files = self.resolve_changed_files(base_ref, &self.extension).await?;
        info!(
            base_ref = %base_ref,
            files = files.len(),
            "Resolved changed files"
        );
        if files.is_empty() {
            return Ok(Vec::new());
        }
        Ok(packages_from_files(&files, exclude_prefixes))
    }

    /// HEAD commit of the workspace.
    pub async fn head_sha(&self) -> Result<String> {
        let spec = CommandSpec::new("git", vec!["rev-parse".to_string(), "HEAD".to_string()])
            .in_dir(&self.workspace_root);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(PrGateError::Git(format!(
                "git rev-parse HEAD failed: {}",
                output.stderr.trim()
            )));
        }
        let sha = output.stdout.trim().to_string();
        if sha.is_empty() {
            return Err(PrGateError::Git(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }
}

/// Keep the trimmed, non-empty lines of `diff_output` that end in `extension`.
pub fn filter_by_extension(diff_output: &str, extension: &str) -> Vec<String> {
    diff_output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.ends_with(extension))
        .map(str::to_string)
        .collect()
}

/// Directory portion of a repository-relative file path.
///
/// Returns `None` for files at the repository root.
pub fn package_of(file: &str) -> Option<&str> {
    file.rsplit_once('/').map(|(dir, _)| dir)
}

/// Group changed files into packages.
///
/// Exclusion is a plain string prefix test on the package path, so the
/// prefix `foo/b` also excludes `foo/bar`.
pub fn packages_from_files(files: &[String], exclude_prefixes: &[String]) -> Vec<String> {
    let mut packages = BTreeSet::new();
    for file in files {
        let Some(package) = package_of(file) else {
            debug!(file = %file, "Dropping root-level file from package set");
            continue;
        };
        if exclude_prefixes
            .iter()
            .any(|prefix| package.starts_with(prefix.as_str()))
        {
            debug!(package = %package, "Excluded by prefix");
            continue;
        }
        packages.insert(package.to_string());
    }
    packages.into_iter().collect()
}
