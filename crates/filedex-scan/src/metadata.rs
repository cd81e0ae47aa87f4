//! File metadata extraction.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::warn;

use filedex_core::{FileRecord, ScanWarning};

/// Records extracted from a batch of paths.
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    /// Records in the order of the input paths, minus skipped files.
    pub records: Vec<FileRecord>,
    /// One warning per skipped file.
    pub warnings: Vec<ScanWarning>,
}

/// Turns file paths into unstored [`FileRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataExtractor {
    follow_symlinks: bool,
}

impl MetadataExtractor {
    /// Create an extractor that reports on links themselves.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report on link targets instead of the links.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Read metadata for `path`.
    ///
    /// A file that vanished or cannot be stat'ed is logged and skipped.
    pub fn extract(&self, path: &Path) -> Option<FileRecord> {
        match self.try_extract(path) {
            Ok(record) => Some(record),
            Err(warning) => {
                warn!("Skipping {}: {}", path.display(), warning.message);
                None
            }
        }
    }

    /// Read metadata for `path`, returning the reason on failure.
    pub fn try_extract(&self, path: &Path) -> Result<FileRecord, ScanWarning> {
        let metadata = if self.follow_symlinks {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        }
        .map_err(|e| ScanWarning::metadata_error(path, &e))?;

        let modified = metadata
            .modified()
            .map_err(|e| ScanWarning::metadata_error(path, &e))?;
        // Birth time is missing on some filesystems
        let created = metadata.created().unwrap_or(modified);

        Ok(FileRecord::from_system_times(
            path,
            metadata.len(),
            modified,
            created,
        ))
    }

    /// Extract every path on the rayon pool, preserving input order.
    pub fn extract_all(&self, paths: &[PathBuf]) -> ExtractOutcome {
        let results: Vec<Result<FileRecord, ScanWarning>> =
            paths.par_iter().map(|path| self.try_extract(path)).collect();

        let mut outcome = ExtractOutcome::default();
        for result in results {
            match result {
                Ok(record) => outcome.records.push(record),
                Err(warning) => {
                    warn!("Skipping {}: {}", warning.path.display(), warning.message);
                    outcome.warnings.push(warning);
                }
            }
        }
        outcome
    }
}
