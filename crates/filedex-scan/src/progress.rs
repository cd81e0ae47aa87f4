//! Scan progress reporting.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

/// How many files are walked between two progress broadcasts.
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of files found so far.
    pub files_found: u64,
    /// Number of directories listed so far.
    pub dirs_scanned: u64,
    /// Most recently found path.
    pub current_path: PathBuf,
    /// Number of entries skipped because of errors.
    pub errors_count: u64,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_found: 0,
            dirs_scanned: 0,
            current_path: PathBuf::new(),
            errors_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_found as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared counters behind the progress broadcast.
///
/// Cloning yields a handle to the same counters, so walkers running on
/// different volumes report one combined total.
#[derive(Debug, Clone)]
pub(crate) struct ProgressTracker {
    inner: Arc<Counters>,
    tx: broadcast::Sender<ScanProgress>,
}

#[derive(Debug)]
struct Counters {
    start_time: Instant,
    files_found: AtomicU64,
    dirs_scanned: AtomicU64,
    errors_count: AtomicU64,
}

impl ProgressTracker {
    pub fn new(tx: broadcast::Sender<ScanProgress>) -> Self {
        Self {
            inner: Arc::new(Counters {
                start_time: Instant::now(),
                files_found: AtomicU64::new(0),
                dirs_scanned: AtomicU64::new(0),
                errors_count: AtomicU64::new(0),
            }),
            tx,
        }
    }

    pub fn record_file(&self, path: &std::path::Path) {
        let count = self.inner.files_found.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PROGRESS_INTERVAL == 0 {
            // Nobody listening is fine
            let _ = self.tx.send(self.snapshot(path.to_path_buf()));
        }
    }

    pub fn record_dir(&self) {
        self.inner.dirs_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.inner.errors_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Broadcast the final totals.
    pub fn finish(&self) {
        let _ = self.tx.send(self.snapshot(PathBuf::new()));
    }

    pub fn snapshot(&self, current_path: PathBuf) -> ScanProgress {
        ScanProgress {
            files_found: self.inner.files_found.load(Ordering::Relaxed),
            dirs_scanned: self.inner.dirs_scanned.load(Ordering::Relaxed),
            current_path,
            errors_count: self.inner.errors_count.load(Ordering::Relaxed),
            elapsed: self.inner.start_time.elapsed(),
        }
    }
}
