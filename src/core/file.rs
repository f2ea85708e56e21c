//! File records flowing through a build stage.

use std::path::{Path, PathBuf};

/// A file travelling through the pipeline.
///
/// Inputs are project or solution files; outputs are artifacts found in the
/// publish location after a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileRecord {
    /// Working directory the record was created relative to
    pub cwd: PathBuf,
    /// Base directory; `path` relative to this is the record's relative name
    pub base: PathBuf,
    /// Absolute path, or `None` for records that carry no file
    pub path: Option<PathBuf>,
    pub contents: Option<Vec<u8>>,
}

impl FileRecord {
    /// A record for a file on disk whose contents are not loaded.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        FileRecord {
            cwd: std::env::current_dir().unwrap_or_default(),
            base,
            path: Some(path),
            contents: None,
        }
    }

    /// A record for a published artifact.
    pub fn published(root: &Path, path: PathBuf, contents: Vec<u8>) -> Self {
        FileRecord {
            cwd: root.to_path_buf(),
            base: root.to_path_buf(),
            path: Some(path),
            contents: Some(contents),
        }
    }

    /// Path relative to `base`, if the record has one.
    pub fn relative(&self) -> Option<&Path> {
        let path = self.path.as_deref()?;
        Some(path.strip_prefix(&self.base).unwrap_or(path))
    }
}
