//! prgate CI - coverage and test gating for changed packages
//!
//! Provides the pull request pipeline that:
//! - Runs `go test` with coverage for every changed package, one at a time
//! - Merges per-package profiles into a single report
//! - Flags changed packages that ship without test sources

pub mod gate;
pub mod merge;
pub mod pipeline;
pub mod profile;
pub mod runner;
pub mod stage;

// Re-export key types
pub use gate::{GateChecker, GateVerdict};
pub use merge::CoverageMerger;
pub use pipeline::{PipelineReport, PrPipeline};
pub use profile::{CoverageSummary, ProfileRecord};
pub use runner::{CoverageRun, CoverageRunner, PackageArtifact};
pub use stage::{artifact_name, TestInvocation};
