//! Error taxonomy for prgate operations.

use std::path::PathBuf;

/// prgate errors.
///
/// All variants are fatal to the pipeline; nothing is retried. A missing
/// coverage artifact is a warning and a gate failure is a verdict, so
/// neither appears here.
#[derive(Debug, thiserror::Error)]
pub enum PrGateError {
    #[error("git diff against {base_ref} failed: {message}")]
    Diff { base_ref: String, message: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("tests for package {package} exited with status {exit_code}")]
    TestExecution { package: String, exit_code: i32 },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: String, timeout_secs: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed coverage record in {path}:{line}: {reason}")]
    Profile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrGateError {
    /// Process exit status a binary should terminate with for this error.
    ///
    /// A failed test invocation propagates the child's own status; a child
    /// that died without one (signal) maps to 1, as does every other error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PrGateError::TestExecution { exit_code, .. } if *exit_code > 0 => *exit_code,
            _ => 1,
        }
    }
}

/// Result type for prgate operations.
pub type Result<T> = std::result::Result<T, PrGateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PrGateError::Diff {
            base_ref: "origin/main".to_string(),
            message: "unknown revision".to_string(),
        };
        assert!(err.to_string().contains("origin/main"));
        assert!(err.to_string().contains("unknown revision"));

        let err = PrGateError::TestExecution {
            package: "pkg/api".to_string(),
            exit_code: 2,
        };
        assert!(err.to_string().contains("pkg/api"));
        assert!(err.to_string().contains("status 2"));
    }

    #[test]
    fn test_exit_code_propagates_test_status() {
        let err = PrGateError::TestExecution {
            package: "pkg".to_string(),
            exit_code: 2,
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_for_signal_and_other_errors() {
        let err = PrGateError::TestExecution {
            package: "pkg".to_string(),
            exit_code: -1,
        };
        assert_eq!(err.exit_code(), 1);

        let err = PrGateError::Config("base_ref must not be empty".to_string());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PrGateError = io.into();
        assert!(matches!(err, PrGateError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
