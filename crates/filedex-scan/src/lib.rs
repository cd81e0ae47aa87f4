//! Volume discovery and directory walking for filedex.
//!
//! This crate finds the files that go into the index:
//!
//! - **Volume discovery** via the platform mount table or drive letters,
//!   keeping only volumes whose root can actually be listed and that no
//!   enclosing root on the same device already covers
//! - **Fault-isolated traversal** on jwalk; an unreadable directory costs
//!   only its own subtree
//! - **Metadata extraction** in parallel on the rayon pool
//! - **Progress updates** via broadcast channels
//! - **Cooperative cancellation** through a `CancellationToken`
//!
//! # Example
//!
//! ```rust,no_run
//! use filedex_scan::{IndexConfig, VolumeScanner};
//! use tokio_util::sync::CancellationToken;
//!
//! let scanner = VolumeScanner::new(IndexConfig::default());
//! let roots = scanner.resolve_roots();
//! let report = scanner.scan(&roots, &CancellationToken::new());
//!
//! println!("Found {} files", report.records.len());
//! println!("Skipped {} entries", report.warnings.len());
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use filedex_scan::{IndexConfig, VolumeScanner};
//!
//! let scanner = VolumeScanner::new(IndexConfig::default());
//! let mut progress_rx = scanner.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Found {} files", progress.files_found);
//!     }
//! });
//! ```

mod inode;
mod metadata;
mod progress;
mod scanner;
mod volume;
mod walker;

pub use inode::{DirIdentity, InodeTracker};
pub use metadata::{ExtractOutcome, MetadataExtractor};
pub use progress::{ScanProgress, PROGRESS_INTERVAL};
pub use scanner::{ScanReport, VolumeScanner};
pub use volume::{non_overlapping_roots, Volume, VolumeEnumerator, VolumeKind};
pub use walker::{DirectoryWalker, WalkOutcome};

// Re-export core types for convenience
pub use filedex_core::{FileRecord, IndexConfig, ScanError, ScanWarning, WarningKind};
