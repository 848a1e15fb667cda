//! Temp file ledger
//!
//! Records every scratch file and directory a run creates, whichever
//! stages actually ran, and deletes them in one pass at the end.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A cleanup step that failed. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub message: String,
}

/// What `drain_all` did
#[derive(Debug, Default)]
pub struct DrainReport {
    pub removed_files: Vec<PathBuf>,
    /// Registered files that were already gone
    pub missing_files: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
    pub warnings: Vec<CleanupWarning>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TempFileLedger {
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

impl TempFileLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::debug!(path = %path.display(), "Registered temp file");
        self.files.insert(path);
    }

    pub fn add_dir(&mut self, path: impl Into<PathBuf>) {
        self.dirs.insert(path.into());
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    pub fn contains_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    /// Delete all registered files, then all registered directories
    /// (deepest first), and empty the ledger.
    pub fn drain_all(&mut self) -> DrainReport {
        let mut report = DrainReport::default();

        for file in std::mem::take(&mut self.files) {
            match fs::remove_file(&file) {
                Ok(()) => report.removed_files.push(file),
                Err(e) if e.kind() == io::ErrorKind::NotFound => report.missing_files.push(file),
                Err(e) => {
                    tracing::warn!("Could not delete temp file {}: {}", file.display(), e);
                    report.warnings.push(CleanupWarning {
                        path: file,
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut dirs: Vec<PathBuf> = std::mem::take(&mut self.dirs).into_iter().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            if !dir.exists() {
                continue;
            }
            match fs::remove_dir(&dir) {
                Ok(()) => report.removed_dirs.push(dir),
                Err(e) => {
                    tracing::warn!(
                        "Could not delete temp directory {}. It may not be empty: {}",
                        dir.display(),
                        e
                    );
                    report.warnings.push(CleanupWarning {
                        path: dir,
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            removed = report.removed_files.len(),
            missing = report.missing_files.len(),
            warnings = report.warnings.len(),
            "Temporary files cleaned up"
        );
        report
    }
}
