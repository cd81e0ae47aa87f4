//! Multi-volume scan pipeline: walk every root, then extract metadata.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use filedex_core::{FileRecord, IndexConfig, ScanError, ScanWarning};

use crate::metadata::MetadataExtractor;
use crate::progress::{ProgressTracker, ScanProgress};
use crate::volume::{non_overlapping_roots, VolumeEnumerator};
use crate::walker::{DirectoryWalker, WalkOutcome};

/// Result of scanning a set of roots.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Roots that were walked.
    pub roots: Vec<PathBuf>,
    /// Extracted records, ids unassigned.
    pub records: Vec<FileRecord>,
    /// Everything that was skipped along the way.
    pub warnings: Vec<ScanWarning>,
    /// Roots that could not be walked at all.
    pub root_errors: Vec<ScanError>,
    /// Directories listed across all roots.
    pub dirs_scanned: u64,
    /// Whether the scan was cancelled; `records` is then empty.
    pub cancelled: bool,
    /// Wall time of the scan.
    pub duration: Duration,
}

/// Scans several volumes concurrently.
///
/// Each root is walked on its own rayon task; the per-root outcomes are
/// merged only after every walk finished.
#[derive(Debug)]
pub struct VolumeScanner {
    config: IndexConfig,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl VolumeScanner {
    /// Create a scanner for the given configuration.
    pub fn new(config: IndexConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config,
            progress_tx,
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// The configuration this scanner was built with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Roots to scan: the configured roots if any, otherwise every
    /// accessible volume. Inaccessible roots are dropped either way.
    pub fn resolve_roots(&self) -> Vec<PathBuf> {
        if self.config.roots.is_empty() {
            VolumeEnumerator::new().list_accessible_volumes()
        } else {
            let roots = non_overlapping_roots(self.config.roots.clone());
            VolumeEnumerator::with_candidates(roots).list_accessible_volumes()
        }
    }

    /// Walk `roots` and extract a record for every file found.
    pub fn scan(&self, roots: &[PathBuf], cancel: &CancellationToken) -> ScanReport {
        let start = Instant::now();
        let tracker = ProgressTracker::new(self.progress_tx.clone());
        let walker = DirectoryWalker::from_config(&self.config).with_progress(tracker.clone());
        let extractor = MetadataExtractor::new().follow_symlinks(self.config.follow_symlinks);

        info!("Scanning {} root(s): {:?}", roots.len(), roots);

        let outcomes: Vec<WalkOutcome> = self.in_pool(|| {
            roots
                .par_iter()
                .map(|root| walker.walk(root, cancel))
                .collect()
        });

        let mut report = ScanReport {
            roots: roots.to_vec(),
            ..ScanReport::default()
        };
        let mut files = Vec::new();
        for outcome in outcomes {
            files.extend(outcome.files);
            report.warnings.extend(outcome.warnings);
            report.dirs_scanned += outcome.dirs_scanned;
            report.cancelled |= outcome.cancelled;
            report.root_errors.extend(outcome.root_error);
        }

        if report.cancelled || cancel.is_cancelled() {
            info!("Scan cancelled after {} files", files.len());
            report.cancelled = true;
            report.duration = start.elapsed();
            return report;
        }

        let walk_duration = start.elapsed();
        let extracted = self.in_pool(|| extractor.extract_all(&files));
        report.records = extracted.records;
        report.warnings.extend(extracted.warnings);
        report.duration = start.elapsed();
        tracker.finish();

        info!(
            "Scan completed in {:.2}s (walk {:.2}s): {} files, {} directories, {} skipped",
            report.duration.as_secs_f64(),
            walk_duration.as_secs_f64(),
            report.records.len(),
            report.dirs_scanned,
            report.warnings.len(),
        );

        report
    }

    fn in_pool<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        if self.config.threads == 0 {
            return op();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
        {
            Ok(pool) => pool.install(op),
            Err(e) => {
                warn!("Failed to build {}-thread pool, using default: {}", self.config.threads, e);
                op()
            }
        }
    }
}
