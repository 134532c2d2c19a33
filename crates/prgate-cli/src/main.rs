//! prgate - pull request coverage gate
//!
//! The `prgate` command drives the coverage pipeline for a multi-package
//! repository.
//!
//! ## Commands
//!
//! - `changed-packages`: list packages changed relative to the base revision
//! - `test`: run tests with coverage and merge the profiles
//! - `gate-check`: fail when a package has no test sources
//! - `merge`: merge existing coverage profiles
//! - `run`: the whole pipeline

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prgate_ci::{CoverageMerger, GateChecker, PrPipeline};
use prgate_core::{
    init_tracing, split_list, CiOutput, CoverMode, FsInspector, PrGateConfig, PrGateError,
    ProcessRunner,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "prgate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Coverage and test gating for changed packages", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "PRGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Base revision to diff against
    #[arg(long, global = true, env = "PRGATE_BASE_REF")]
    base_ref: Option<String>,

    /// Repository root
    #[arg(long, global = true, env = "PRGATE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Directory for coverage artifacts
    #[arg(long, global = true, env = "PRGATE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Package path prefixes to skip (comma or whitespace separated)
    #[arg(long, global = true, env = "PRGATE_EXCLUDE_PREFIXES")]
    exclude: Option<String>,

    /// Coverage mode (set, count, atomic)
    #[arg(long, global = true, env = "PRGATE_COVER_MODE")]
    cover_mode: Option<CoverMode>,

    /// Per-package test timeout in seconds (0 = none)
    #[arg(long, global = true, env = "PRGATE_TEST_TIMEOUT")]
    timeout: Option<u64>,

    /// CI output file receiving key=value lines
    #[arg(long, global = true, env = "GITHUB_OUTPUT")]
    ci_output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List packages changed relative to the base revision
    ChangedPackages,

    /// Run unit tests with coverage and merge the profiles
    Test {
        /// Packages to test (default: the resolved change set)
        packages: Vec<String>,
    },

    /// Check that every package contains test sources
    GateCheck {
        /// Package paths, whitespace separated
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Merge coverage profiles into one file
    Merge {
        /// Merged profile to write
        #[arg(short, long)]
        output: PathBuf,

        /// Profiles to merge, in order
        #[arg(required = true)]
        profiles: Vec<PathBuf>,
    },

    /// Run the full pipeline: change set, coverage, merge and gate
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            err.downcast_ref::<PrGateError>()
                .map(PrGateError::exit_code)
                .unwrap_or(1)
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::ChangedPackages => cmd_changed_packages(config).await,
        Commands::Test { packages } => cmd_test(config, packages).await,
        Commands::GateCheck { packages } => cmd_gate_check(config, &packages),
        Commands::Merge { output, profiles } => cmd_merge(&config, &profiles, &output),
        Commands::Run => cmd_run(config).await,
    }
}

/// Defaults, then the config file, then flags and their environment fallbacks.
fn load_config(cli: &Cli) -> Result<PrGateConfig> {
    let mut config = match &cli.config {
        Some(path) => PrGateConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PrGateConfig::default(),
    };

    if let Some(base_ref) = &cli.base_ref {
        config.base_ref = base_ref.clone();
    }
    if let Some(workspace) = &cli.workspace {
        config.workspace_root = workspace.clone();
    }
    if let Some(output_dir) = &cli.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(exclude) = &cli.exclude {
        config.exclude_prefixes = split_list(exclude);
    }
    if let Some(cover_mode) = cli.cover_mode {
        config.cover_mode = cover_mode;
    }
    if let Some(timeout) = cli.timeout {
        config.test_timeout_secs = timeout;
    }
    if let Some(ci_output) = &cli.ci_output {
        config.ci_output = Some(ci_output.clone());
    }

    config.validate()?;
    Ok(config)
}

fn pipeline(config: PrGateConfig) -> PrPipeline {
    PrPipeline::new(config, Arc::new(ProcessRunner), Arc::new(FsInspector))
}

async fn cmd_changed_packages(config: PrGateConfig) -> Result<i32> {
    let packages = pipeline(config)
        .changed_packages()
        .await
        .context("Failed to resolve changed packages")?;

    for package in &packages {
        println!("{package}");
    }
    info!(count = packages.len(), "Changed packages resolved");
    Ok(0)
}

async fn cmd_test(config: PrGateConfig, packages: Vec<String>) -> Result<i32> {
    let output = CiOutput::new(config.ci_output.clone());
    let pipeline = pipeline(config);

    let packages = if packages.is_empty() {
        pipeline.changed_packages().await?
    } else {
        packages.iter().flat_map(|p| split_list(p)).collect()
    };

    let run = pipeline.run_tests(&packages).await?;

    if run.merged {
        println!("{}", run.merged_path.display());
        output.set("coverage_file", &run.merged_path.display().to_string())?;
    } else {
        info!("No coverage profiles produced, nothing merged");
    }
    Ok(0)
}

fn cmd_gate_check(config: PrGateConfig, packages: &[String]) -> Result<i32> {
    let packages: Vec<String> = packages
        .iter()
        .flat_map(|p| p.split_whitespace().map(str::to_string))
        .collect();

    let verdict = GateChecker::from_config(Arc::new(FsInspector), &config)
        .evaluate(&packages)
        .context("Failed to inspect package directories")?;

    CiOutput::new(config.ci_output.clone()).set_all([
        ("missing_tests", verdict.missing.join(" ")),
        ("gate_passed", verdict.passed.to_string()),
    ])?;

    if verdict.passed {
        println!("✓ {}", verdict.message);
        return Ok(0);
    }
    for line in verdict.render_annotations() {
        println!("{line}");
    }
    Ok(1)
}

fn cmd_merge(config: &PrGateConfig, profiles: &[PathBuf], output: &Path) -> Result<i32> {
    CoverageMerger::new(config.cover_mode)
        .merge(profiles, output)
        .with_context(|| format!("Failed to merge into {}", output.display()))?;
    println!("{}", output.display());
    Ok(0)
}

async fn cmd_run(config: PrGateConfig) -> Result<i32> {
    let report = pipeline(config).run().await?;

    println!("Run ID: {}", report.run_id);
    println!("Base: {}", report.base_ref);
    println!("Packages: {}", report.packages.len());
    for package in &report.packages {
        println!("  {package}");
    }
    if let Some(summary) = &report.summary {
        println!(
            "Coverage: {:.1}% ({}/{} statements)",
            summary.percent, summary.covered_statements, summary.statements
        );
        println!("Profile: {}", report.coverage.merged_path.display());
    }
    for package in &report.coverage.missing_artifacts {
        println!("  ⚠ no coverage file for {package}");
    }
    println!("Duration: {}ms", report.duration_ms);
    println!();

    if report.passed() {
        println!("✓ {}", report.gate.message);
        Ok(0)
    } else {
        for line in report.gate.render_annotations() {
            println!("{line}");
        }
        Ok(1)
    }
}
