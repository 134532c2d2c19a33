//! Pull request pipeline orchestration and run reporting.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use prgate_core::{
    ChangeSetResolver, CiOutput, CommandRunner, DirectoryInspector, PrGateConfig, Result,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::gate::{GateChecker, GateVerdict};
use crate::profile::{self, CoverageSummary};
use crate::runner::{CoverageRun, CoverageRunner};

/// Result of a complete pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Unique id of this run.
    pub run_id: String,

    /// Base revision the change set was computed against.
    pub base_ref: String,

    /// HEAD commit, when it could be determined.
    pub head_sha: Option<String>,

    pub started_at: DateTime<Utc>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Changed packages, sorted.
    pub packages: Vec<String>,

    pub coverage: CoverageRun,

    /// SHA-256 of the merged profile, when one was written.
    pub coverage_digest: Option<String>,

    pub summary: Option<CoverageSummary>,

    pub gate: GateVerdict,
}

impl PipelineReport {
    /// Whether the run should let the change through.
    pub fn passed(&self) -> bool {
        self.gate.passed
    }

    /// Key/value pairs published to the CI output channel.
    pub fn outputs(&self) -> Vec<(&'static str, String)> {
        let mut outputs = package_outputs(&self.packages);
        if self.coverage.merged {
            outputs.push((
                "coverage_file",
                self.coverage.merged_path.display().to_string(),
            ));
        }
        if let Some(summary) = &self.summary {
            outputs.push(("coverage_percent", format!("{:.1}", summary.percent)));
        }
        outputs.push(("missing_tests", self.gate.missing.join(" ")));
        outputs.push(("gate_passed", self.gate.passed.to_string()));
        outputs
    }
}

/// Outputs describing the resolved change set.
pub fn package_outputs(packages: &[String]) -> Vec<(&'static str, String)> {
    vec![
        ("packages", packages.join(" ")),
        ("package_count", packages.len().to_string()),
        ("has_changes", (!packages.is_empty()).to_string()),
    ]
}

/// Hex SHA-256 digest of a file's contents.
pub fn file_digest(path: &Path) -> Result<String> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Pipeline orchestrator: change set, coverage, merge, gate.
pub struct PrPipeline {
    config: PrGateConfig,
    runner: Arc<dyn CommandRunner>,
    inspector: Arc<dyn DirectoryInspector>,
    output: CiOutput,
}

impl PrPipeline {
    pub fn new(
        config: PrGateConfig,
        runner: Arc<dyn CommandRunner>,
        inspector: Arc<dyn DirectoryInspector>,
    ) -> Self {
        let output = CiOutput::new(config.ci_output.clone());
        Self {
            config,
            runner,
            inspector,
            output,
        }
    }

    pub fn config(&self) -> &PrGateConfig {
        &self.config
    }

    pub fn resolver(&self) -> ChangeSetResolver {
        ChangeSetResolver::from_config(self.runner.clone(), &self.config)
    }

    pub fn coverage_runner(&self) -> CoverageRunner {
        CoverageRunner::from_config(self.runner.clone(), &self.config)
    }

    pub fn gate_checker(&self) -> GateChecker {
        GateChecker::from_config(self.inspector.clone(), &self.config)
    }

    /// Resolve the changed packages and publish them as CI outputs.
    pub async fn changed_packages(&self) -> Result<Vec<String>> {
        let packages = self
            .resolver()
            .resolve_changed_packages(&self.config.base_ref, &self.config.exclude_prefixes)
            .await?;
        self.output.set_all(package_outputs(&packages))?;
        Ok(packages)
    }

    /// Run coverage for `packages` into the configured output directory.
    pub async fn run_tests(&self, packages: &[String]) -> Result<CoverageRun> {
        self.coverage_runner()
            .run_tests(packages, &self.config.coverage_dir())
            .await
    }

    /// Execute the full pipeline.
    ///
    /// A failing diff or test invocation aborts with an error and no report
    /// is written. A gate failure is a normal outcome, reported through
    /// [`PipelineReport::passed`].
    pub async fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, base_ref = %self.config.base_ref, "Starting PR pipeline");

        let resolver = self.resolver();
        let head_sha = match resolver.head_sha().await {
            Ok(sha) => Some(sha),
            Err(e) => {
                warn!(error = %e, "Could not determine HEAD commit");
                None
            }
        };

        let packages = resolver
            .resolve_changed_packages(&self.config.base_ref, &self.config.exclude_prefixes)
            .await?;
        if packages.is_empty() {
            info!("No changed packages");
        } else {
            info!(count = packages.len(), "Changed packages: {}", packages.join(" "));
        }

        let coverage = self.run_tests(&packages).await?;

        let (coverage_digest, summary) = if coverage.merged {
            // The summary is informational; a record it cannot parse must not
            // keep the gate from running.
            let summary = match profile::summarize(&coverage.merged_path) {
                Ok(summary) => {
                    info!(
                        statements = summary.statements,
                        covered = summary.covered_statements,
                        "Coverage: {:.1}%",
                        summary.percent
                    );
                    Some(summary)
                }
                Err(e) => {
                    warn!(error = %e, "Could not summarise merged coverage");
                    None
                }
            };
            (Some(file_digest(&coverage.merged_path)?), summary)
        } else {
            (None, None)
        };

        let gate = self.gate_checker().evaluate(&packages)?;
        if gate.passed {
            info!("{}", gate.message);
        } else {
            warn!(missing = %gate.missing.join(" "), "{}", gate.message);
        }

        let report = PipelineReport {
            run_id,
            base_ref: self.config.base_ref.clone(),
            head_sha,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            packages,
            coverage,
            coverage_digest,
            summary,
            gate,
        };

        self.output.set_all(report.outputs())?;
        self.write_report(&report)?;
        info!(run_id = %report.run_id, passed = report.passed(), "PR pipeline finished");
        Ok(report)
    }

    fn write_report(&self, report: &PipelineReport) -> Result<()> {
        let path = self.config.report_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_vec_pretty(report)?)?;
        info!(path = %path.display(), "Run report written");
        Ok(())
    }
}
