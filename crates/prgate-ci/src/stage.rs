//! Per-package test invocation.

use std::path::{Path, PathBuf};

use prgate_core::{CommandSpec, CoverMode};
use serde::{Deserialize, Serialize};

/// File name of the coverage profile produced for `package`.
///
/// Path separators and dots become `_`, and leading/trailing `_` are trimmed,
/// so `./svc/api.v2` becomes `svc_api_v2.out`.
pub fn artifact_name(package: &str) -> String {
    let safe = package.replace(['/', '.'], "_");
    format!("{}.out", safe.trim_matches('_'))
}

/// One `go test` run with coverage for a single package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestInvocation {
    /// Package path relative to the workspace root.
    pub package: String,

    /// Where the toolchain writes the coverage profile.
    pub artifact: PathBuf,

    /// Coverage mode.
    pub cover_mode: CoverMode,

    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,
}

impl TestInvocation {
    /// Create an invocation writing its profile into `output_dir`.
    pub fn new(package: &str, output_dir: &Path, cover_mode: CoverMode, timeout_secs: u64) -> Self {
        Self {
            package: package.to_string(),
            artifact: output_dir.join(artifact_name(package)),
            cover_mode,
            timeout_secs,
        }
    }

    /// `go test -v -coverprofile=<artifact> -covermode=<mode> ./<package>`
    pub fn command(&self) -> Vec<String> {
        vec![
            "go".to_string(),
            "test".to_string(),
            "-v".to_string(),
            format!("-coverprofile={}", self.artifact.display()),
            format!("-covermode={}", self.cover_mode),
            format!("./{}", self.package),
        ]
    }

    /// Command spec running in `workspace_root` with output streamed to the
    /// operator.
    pub fn to_command_spec(&self, workspace_root: &Path) -> CommandSpec {
        let mut command = self.command();
        let program = command.remove(0);
        CommandSpec::new(program, command)
            .in_dir(workspace_root)
            .streamed()
            .with_timeout(self.timeout_secs)
    }
}
