//! Test-presence gate for changed packages.

use std::path::PathBuf;
use std::sync::Arc;

use prgate_core::{DirectoryInspector, PrGateConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Gate evaluation verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Packages without a test source file, in input order (empty if passed).
    pub missing: Vec<String>,

    /// Summary message.
    pub message: String,

    /// Test file suffix the packages were checked for.
    pub test_file_suffix: String,
}

impl GateVerdict {
    /// Build a verdict from the packages found missing tests.
    pub fn from_missing(missing: Vec<String>, test_file_suffix: &str) -> Self {
        let passed = missing.is_empty();
        let message = if passed {
            "All changed packages have unit tests".to_string()
        } else {
            format!("{} package(s) missing unit tests", missing.len())
        };
        Self {
            passed,
            missing,
            message,
            test_file_suffix: test_file_suffix.to_string(),
        }
    }

    /// Workflow annotation lines: one `::error::` line per offending package
    /// followed by a remediation line. Empty when the gate passed.
    pub fn render_annotations(&self) -> Vec<String> {
        if self.passed {
            return Vec::new();
        }
        let mut lines: Vec<String> = self
            .missing
            .iter()
            .map(|package| format!("::error::Missing unit tests in package: {package}"))
            .collect();
        lines.push(format!(
            "Add at least one *{} file to each package listed above.",
            self.test_file_suffix
        ));
        lines
    }
}

/// Classifies changed packages by whether they contain test sources.
///
/// The checker only reports; turning a failed verdict into a non-zero exit
/// status is up to the caller.
pub struct GateChecker {
    inspector: Arc<dyn DirectoryInspector>,
    workspace_root: PathBuf,
    test_file_suffix: String,
}

impl GateChecker {
    pub fn new(
        inspector: Arc<dyn DirectoryInspector>,
        workspace_root: impl Into<PathBuf>,
        test_file_suffix: impl Into<String>,
    ) -> Self {
        Self {
            inspector,
            workspace_root: workspace_root.into(),
            test_file_suffix: test_file_suffix.into(),
        }
    }

    pub fn from_config(inspector: Arc<dyn DirectoryInspector>, config: &PrGateConfig) -> Self {
        Self::new(
            inspector,
            config.workspace_root.clone(),
            config.test_file_suffix.clone(),
        )
    }

    /// Packages whose directory exists but holds no test source file.
    ///
    /// Packages that no longer exist (every file deleted by the change) are
    /// skipped, not reported. A directory that cannot be listed counts as
    /// having no test sources. Input order is preserved.
    pub fn find_packages_missing_tests(&self, packages: &[String]) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for package in packages {
            let dir = self.workspace_root.join(package);
            if !self.inspector.is_dir(&dir) {
                debug!(package = %package, "Package directory gone, skipping");
                continue;
            }
            let has_tests = match self
                .inspector
                .has_entry_with_suffix(&dir, &self.test_file_suffix)
            {
                Ok(found) => found,
                Err(e) => {
                    warn!(package = %package, error = %e, "Package directory unreadable");
                    false
                }
            };
            if !has_tests {
                missing.push(package.clone());
            }
        }
        Ok(missing)
    }

    /// Evaluate the gate for `packages`.
    pub fn evaluate(&self, packages: &[String]) -> Result<GateVerdict> {
        let missing = self.find_packages_missing_tests(packages)?;
        Ok(GateVerdict::from_missing(missing, &self.test_file_suffix))
    }
}
