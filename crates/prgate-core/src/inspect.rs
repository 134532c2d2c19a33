//! Directory inspection for test-file detection.

use std::path::Path;

use crate::error::Result;

/// Capability to look at package directories.
pub trait DirectoryInspector: Send + Sync {
    /// Whether `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Whether `dir` directly contains a non-directory entry whose file name
    /// ends with `suffix`. Subdirectories are not searched.
    fn has_entry_with_suffix(&self, dir: &Path, suffix: &str) -> Result<bool>;
}

/// Inspects the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsInspector;

impl DirectoryInspector for FsInspector {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn has_entry_with_suffix(&self, dir: &Path, suffix: &str) -> Result<bool> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            if entry.file_name().to_string_lossy().ends_with(suffix) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_inspector_finds_test_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("crud.go"), "package x").unwrap();
        std::fs::write(dir.path().join("crud_test.go"), "package x").unwrap();

        assert!(FsInspector.is_dir(dir.path()));
        assert!(FsInspector
            .has_entry_with_suffix(dir.path(), "_test.go")
            .unwrap());
    }

    #[test]
    fn test_fs_inspector_ignores_nested_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("crud.go"), "package x").unwrap();
        std::fs::create_dir(dir.path().join("mocks")).unwrap();
        std::fs::write(dir.path().join("mocks").join("responders_test.go"), "").unwrap();
        std::fs::create_dir(dir.path().join("fixtures_test.go")).unwrap();

        assert!(!FsInspector
            .has_entry_with_suffix(dir.path(), "_test.go")
            .unwrap());
    }

    #[test]
    fn test_fs_inspector_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        assert!(!FsInspector.is_dir(&missing));
        assert!(FsInspector.has_entry_with_suffix(&missing, "_test.go").is_err());
    }
}
