//! Integration tests for the PR pipeline with a scripted command runner.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use prgate_ci::{CoverageRunner, PrPipeline};
use prgate_core::fakes::{output, ScriptedRunner};
use prgate_core::{CommandSpec, CoverMode, FsInspector, PrGateConfig, PrGateError, Result};

const DIFF: &str = "pkgA/x.go\npkgA/y.go\npkgB/z.go\nroot.go\nREADME.md\n";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The `-coverprofile=` target of a `go test` command.
fn coverprofile(spec: &CommandSpec) -> Option<PathBuf> {
    spec.args
        .iter()
        .find_map(|a| a.strip_prefix("-coverprofile="))
        .map(PathBuf::from)
}

/// The package a `go test` command targets.
fn target_package(spec: &CommandSpec) -> String {
    spec.args
        .last()
        .and_then(|a| a.strip_prefix("./"))
        .unwrap_or_default()
        .to_string()
}

/// Answers `git diff` with `diff` and `go test` per `on_test`.
fn scripted<F>(diff: &'static str, on_test: F) -> Arc<ScriptedRunner>
where
    F: Fn(&str, Option<PathBuf>) -> Result<i32> + Send + Sync + 'static,
{
    Arc::new(ScriptedRunner::new(move |spec| match spec.program.as_str() {
        "git" if spec.args.first().map(String::as_str) == Some("rev-parse") => {
            Ok(output(0, "0123456789abcdef0123456789abcdef01234567\n"))
        }
        "git" => Ok(output(0, diff)),
        "go" => {
            let code = on_test(&target_package(spec), coverprofile(spec))?;
            Ok(output(code, ""))
        }
        other => panic!("unexpected command {other}"),
    }))
}

/// Writes a two-record profile for the package.
fn write_profile(package: &str, path: Option<PathBuf>) -> Result<i32> {
    let path = path.expect("go test without -coverprofile");
    std::fs::write(
        path,
        format!("mode: atomic\n{package}/a.go:1.1,3.2 2 1\n{package}/a.go:5.1,6.2 1 0\n"),
    )?;
    Ok(0)
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("pkgA")).unwrap();
    std::fs::write(root.join("pkgA/x.go"), "package a").unwrap();
    std::fs::write(root.join("pkgA/x_test.go"), "package a").unwrap();
    std::fs::create_dir_all(root.join("pkgB")).unwrap();
    std::fs::write(root.join("pkgB/z.go"), "package b").unwrap();
    std::fs::write(root.join("pkgB/z_test.go"), "package b").unwrap();
    dir
}

fn config(root: &Path) -> PrGateConfig {
    PrGateConfig {
        workspace_root: root.to_path_buf(),
        ci_output: Some(root.join("github_output")),
        ..Default::default()
    }
}

fn go_calls(runner: &ScriptedRunner) -> Vec<String> {
    runner
        .calls()
        .iter()
        .filter(|c| c.program == "go")
        .map(target_package)
        .collect()
}

/// Test: successful pipeline merges both packages and passes the gate
#[tokio::test]
async fn test_successful_pipeline() {
    let ws = workspace();
    let runner = scripted(DIFF, write_profile);
    let pipeline = PrPipeline::new(config(ws.path()), runner.clone(), Arc::new(FsInspector));

    let report = pipeline.run().await.expect("pipeline failed");

    assert!(report.passed(), "Gate should pass");
    assert_eq!(report.packages, strings(&["pkgA", "pkgB"]));
    assert_eq!(go_calls(&runner), strings(&["pkgA", "pkgB"]));
    assert_eq!(
        report.head_sha.as_deref(),
        Some("0123456789abcdef0123456789abcdef01234567")
    );

    // Merged profile: one header, records in package order
    assert!(report.coverage.merged);
    let merged = std::fs::read_to_string(&report.coverage.merged_path).unwrap();
    let lines: Vec<&str> = merged.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "mode: atomic");
    assert!(lines[1].starts_with("pkgA/"));
    assert!(lines[2].starts_with("pkgA/"));
    assert!(lines[3].starts_with("pkgB/"));
    assert!(lines[4].starts_with("pkgB/"));
    assert_eq!(merged.matches("mode:").count(), 1);

    let summary = report.summary.expect("summary");
    assert_eq!(summary.statements, 6);
    assert_eq!(summary.covered_statements, 4);
    assert_eq!(report.coverage_digest.as_ref().map(String::len), Some(64));

    // CI outputs
    let outputs = std::fs::read_to_string(ws.path().join("github_output")).unwrap();
    assert!(outputs.contains("packages=pkgA pkgB\n"));
    assert!(outputs.contains("package_count=2\n"));
    assert!(outputs.contains("has_changes=true\n"));
    assert!(outputs.contains("coverage_percent=66.7\n"));
    assert!(outputs.contains("gate_passed=true\n"));

    // Report on disk
    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(ws.path().join("coverage/pr-report.json")).unwrap())
            .unwrap();
    assert_eq!(json["run_id"], report.run_id.as_str());
    assert_eq!(json["gate"]["passed"], true);
}

/// Test: a failing package aborts with its exit status and nothing is merged
#[tokio::test]
async fn test_failing_package_aborts_pipeline() {
    let ws = workspace();
    let runner = scripted(DIFF, |package, path| {
        if package == "pkgA" {
            // Profile written before the failure must not be merged
            write_profile(package, path)?;
            return Ok(2);
        }
        write_profile(package, path)
    });
    let pipeline = PrPipeline::new(config(ws.path()), runner.clone(), Arc::new(FsInspector));

    let err = pipeline.run().await.expect_err("pipeline should abort");

    match &err {
        PrGateError::TestExecution { package, exit_code } => {
            assert_eq!(package, "pkgA");
            assert_eq!(*exit_code, 2);
        }
        other => panic!("expected test execution error, got {other:?}"),
    }
    assert_eq!(err.exit_code(), 2);
    assert_eq!(go_calls(&runner), strings(&["pkgA"]), "pkgB must not run");
    assert!(!ws.path().join("coverage/unit-coverage.txt").exists());
    assert!(!ws.path().join("coverage/pr-report.json").exists());
}

/// Test: gate failure is reported, not raised
#[tokio::test]
async fn test_gate_failure_reported() {
    let ws = workspace();
    std::fs::create_dir_all(ws.path().join("pkgC")).unwrap();
    std::fs::write(ws.path().join("pkgC/c.go"), "package c").unwrap();

    let runner = scripted("pkgA/x.go\npkgC/c.go\npkgGone/old.go\n", write_profile);
    let pipeline = PrPipeline::new(config(ws.path()), runner, Arc::new(FsInspector));

    let report = pipeline.run().await.expect("pipeline failed");

    assert!(!report.passed());
    assert_eq!(report.gate.missing, strings(&["pkgC"]));
    let outputs = std::fs::read_to_string(ws.path().join("github_output")).unwrap();
    assert!(outputs.contains("missing_tests=pkgC\n"));
    assert!(outputs.contains("gate_passed=false\n"));
}

/// Test: packages without profiles are warnings and skip the merge
#[tokio::test]
async fn test_no_profiles_skips_merge() {
    let ws = workspace();
    let runner = scripted(DIFF, |_, _| Ok(0));
    let pipeline = PrPipeline::new(config(ws.path()), runner, Arc::new(FsInspector));

    let report = pipeline.run().await.expect("pipeline failed");

    assert!(!report.coverage.merged);
    assert!(!report.coverage.merged_path.exists());
    assert_eq!(report.coverage.missing_artifacts, strings(&["pkgA", "pkgB"]));
    assert!(report.summary.is_none());
    assert!(report.coverage_digest.is_none());
}

/// Test: an unparseable profile record drops the summary but still gates
#[tokio::test]
async fn test_unparseable_record_keeps_gate() {
    let ws = workspace();
    let runner = scripted(DIFF, |package, path| {
        let path = path.expect("go test without -coverprofile");
        std::fs::write(path, format!("mode: atomic\n{package}/a.go:1.1,3.2 two 1\n"))?;
        Ok(0)
    });
    let pipeline = PrPipeline::new(config(ws.path()), runner, Arc::new(FsInspector));

    let report = pipeline.run().await.expect("pipeline failed");

    assert!(report.coverage.merged);
    assert!(report.summary.is_none());
    assert!(report.coverage_digest.is_some());
    assert!(report.passed());
    let outputs = std::fs::read_to_string(ws.path().join("github_output")).unwrap();
    assert!(!outputs.contains("coverage_percent="));
    assert!(outputs.contains("gate_passed=true\n"));
    assert!(ws.path().join("coverage/pr-report.json").exists());
}

/// Test: no changed packages still produces outputs and a passing report
#[tokio::test]
async fn test_no_changes() {
    let ws = workspace();
    let runner = scripted("root.go\ndocs/readme.md\n", write_profile);
    let pipeline = PrPipeline::new(config(ws.path()), runner.clone(), Arc::new(FsInspector));

    let report = pipeline.run().await.expect("pipeline failed");

    assert!(report.passed());
    assert!(report.packages.is_empty());
    assert!(go_calls(&runner).is_empty());
    let outputs = std::fs::read_to_string(ws.path().join("github_output")).unwrap();
    assert!(outputs.contains("has_changes=false\n"));
}

/// Test: exclude prefixes keep packages out of testing and gating
#[tokio::test]
async fn test_excluded_packages_not_tested() {
    let ws = workspace();
    let runner = scripted(DIFF, write_profile);
    let config = PrGateConfig {
        exclude_prefixes: strings(&["pkgB"]),
        ..config(ws.path())
    };
    let pipeline = PrPipeline::new(config, runner.clone(), Arc::new(FsInspector));

    let packages = pipeline.changed_packages().await.unwrap();
    assert_eq!(packages, strings(&["pkgA"]));

    let report = pipeline.run().await.unwrap();
    assert_eq!(go_calls(&runner), strings(&["pkgA"]));
    assert_eq!(report.packages, strings(&["pkgA"]));
}

/// Test: the diff failing aborts before any test runs
#[tokio::test]
async fn test_diff_failure_aborts() {
    let ws = workspace();
    let runner = Arc::new(ScriptedRunner::failing(128, "fatal: bad revision"));
    let pipeline = PrPipeline::new(config(ws.path()), runner.clone(), Arc::new(FsInspector));

    let err = pipeline.run().await.expect_err("pipeline should abort");
    assert!(matches!(err, PrGateError::Diff { .. }));
    assert!(runner.calls().iter().all(|c| c.program == "git"));
}

/// Test: go test receives the configured mode, timeout and streaming
#[tokio::test]
async fn test_invocation_uses_configured_mode() {
    let ws = workspace();
    let runner = scripted(DIFF, write_profile);
    let coverage = CoverageRunner::new(runner.clone(), ws.path())
        .with_cover_mode(CoverMode::Count)
        .with_timeout(90);

    let run = coverage
        .run_tests(&strings(&["pkgA"]), &ws.path().join("out"))
        .await
        .unwrap();

    let call = runner
        .calls()
        .into_iter()
        .find(|c| c.program == "go")
        .expect("go test call");
    assert!(call.args.contains(&"-covermode=count".to_string()));
    assert!(call.args.contains(&"-v".to_string()));
    assert!(call.stream);
    assert_eq!(call.timeout_secs, 90);
    assert_eq!(call.current_dir.as_deref(), Some(ws.path()));
    assert!(coverprofile(&call).unwrap().is_absolute());

    let merged = std::fs::read_to_string(&run.merged_path).unwrap();
    assert!(merged.starts_with("mode: count\n"));
}
