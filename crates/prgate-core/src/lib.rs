//! prgate Core Library
//!
//! Shared plumbing for the prgate pipeline:
//! - Configuration and error taxonomy
//! - Command execution behind the `CommandRunner` capability
//! - Change-set resolution (changed files -> changed packages)
//! - Directory inspection and CI step outputs

pub mod command;
pub mod config;
pub mod error;
pub mod fakes;
pub mod git;
pub mod inspect;
pub mod output;
pub mod telemetry;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use config::{split_list, CoverMode, PrGateConfig};
pub use error::{PrGateError, Result};
pub use git::{filter_by_extension, package_of, packages_from_files, ChangeSetResolver};
pub use inspect::{DirectoryInspector, FsInspector};
pub use output::CiOutput;
pub use telemetry::init_tracing;

/// prgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
