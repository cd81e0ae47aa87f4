//! The indexing and search facade used by front ends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use filedex_core::{validate_query, FileRecord, IndexConfig, ResultPager, ScanWarning};
use filedex_scan::{ScanProgress, VolumeScanner};

use crate::error::{IndexError, Result};
use crate::search::SearchEngine;
use crate::store::IndexStore;

/// What a rebuild ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The index was replaced.
    Rebuilt {
        /// Records written.
        records: usize,
        /// Generation now visible to searches.
        generation: u64,
    },
    /// No accessible volume or root; the index was left untouched.
    NothingToScan,
}

/// Summary of [`Indexer::rebuild_index_from_scan`].
#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub outcome: RebuildOutcome,
    pub roots: Vec<PathBuf>,
    pub warnings: Vec<ScanWarning>,
    pub dirs_scanned: u64,
    pub scan_duration: Duration,
    pub duration: Duration,
}

impl RebuildReport {
    fn nothing_to_scan(duration: Duration) -> Self {
        Self {
            outcome: RebuildOutcome::NothingToScan,
            roots: Vec::new(),
            warnings: Vec::new(),
            dirs_scanned: 0,
            scan_duration: Duration::ZERO,
            duration,
        }
    }

    /// Records written, zero when nothing was scanned.
    pub fn records(&self) -> usize {
        match self.outcome {
            RebuildOutcome::Rebuilt { records, .. } => records,
            RebuildOutcome::NothingToScan => 0,
        }
    }
}

/// Owns the index store and ties scanning, rebuilding and searching together.
///
/// The indexer itself holds no mutable state; it can be shared behind an
/// `Arc` and used from several threads at once.
#[derive(Debug)]
pub struct Indexer {
    config: IndexConfig,
    store: Arc<IndexStore>,
    engine: SearchEngine,
    scanner: VolumeScanner,
}

impl Indexer {
    /// Open the index at `config.database_path`.
    pub fn open(config: IndexConfig) -> Result<Self> {
        let store = Arc::new(IndexStore::open(&config.database_path)?);
        Ok(Self::with_store(config, store))
    }

    /// Use an already opened store.
    pub fn with_store(config: IndexConfig, store: Arc<IndexStore>) -> Self {
        Self {
            engine: SearchEngine::new(Arc::clone(&store)),
            scanner: VolumeScanner::new(config.clone()),
            config,
            store,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// Subscribe to progress of the next rebuild's scan.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.scanner.subscribe()
    }

    /// Roots a rebuild would scan right now.
    pub fn scan_roots(&self) -> Vec<PathBuf> {
        self.scanner.resolve_roots()
    }

    /// Whether the index holds no records.
    pub fn is_index_empty(&self) -> Result<bool> {
        self.store.is_empty()
    }

    /// Scan every accessible volume (or the configured roots) and replace
    /// the index with what was found.
    ///
    /// Blocks until the scan and the store rebuild are done. Cancelling
    /// `cancel` stops both; the previous index then stays in place and
    /// [`IndexError::Cancelled`] is returned.
    pub fn rebuild_index_from_scan(&self, cancel: &CancellationToken) -> Result<RebuildReport> {
        let start = Instant::now();

        let roots = self.scanner.resolve_roots();
        if roots.is_empty() {
            info!("No accessible volumes, index left unchanged");
            return Ok(RebuildReport::nothing_to_scan(start.elapsed()));
        }
        self.rebuild_from_roots(&roots, cancel, start)
    }

    fn rebuild_from_roots(
        &self,
        roots: &[PathBuf],
        cancel: &CancellationToken,
        start: Instant,
    ) -> Result<RebuildReport> {
        let mut scan = self.scanner.scan(roots, cancel);
        if scan.cancelled {
            return Err(IndexError::Cancelled);
        }
        if !scan.root_errors.is_empty() && scan.root_errors.len() == roots.len() {
            // Every root vanished between resolving and walking
            error!("No root could be walked, index left unchanged");
            return Err(scan.root_errors.swap_remove(0).into());
        }

        let commit = self.store.rebuild(&scan.records, cancel)?;

        let report = RebuildReport {
            outcome: RebuildOutcome::Rebuilt {
                records: commit.records,
                generation: commit.generation,
            },
            roots: scan.roots,
            warnings: scan.warnings,
            dirs_scanned: scan.dirs_scanned,
            scan_duration: scan.duration,
            duration: start.elapsed(),
        };

        info!(
            "Rebuild finished in {:.2}s: {} records from {} root(s), {} skipped",
            report.duration.as_secs_f64(),
            commit.records,
            report.roots.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    /// Search the index and return a pager over the result snapshot.
    pub fn search(&self, query: &str) -> Result<ResultPager> {
        let query = validate_query(query)?;
        let results = self.engine.search(&query)?;
        Ok(ResultPager::new(results, self.config.page_size))
    }

    /// Search the index and stream the results page by page.
    ///
    /// The search runs on tokio's blocking pool, so this must be called from
    /// within a runtime. The channel closes after the last page; dropping the
    /// receiver stops delivery early.
    pub fn search_pages(&self, query: &str) -> Result<mpsc::Receiver<Vec<FileRecord>>> {
        let query = validate_query(query)?;
        let engine = self.engine.clone();
        let page_size = self.config.page_size.max(1);
        let (tx, rx) = mpsc::channel(4);

        tokio::task::spawn_blocking(move || match engine.search(&query) {
            Ok(results) => {
                for page in results.chunks(page_size) {
                    if tx.blocking_send(page.to_vec()).is_err() {
                        break;
                    }
                }
            }
            Err(e) => error!("Search for {:?} failed: {}", query, e),
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedex_core::ScanError;
    use std::fs;
    use tempfile::TempDir;

    fn indexer_for(roots: Vec<PathBuf>) -> Indexer {
        let config = IndexConfig::with_roots(roots);
        Indexer::with_store(config, Arc::new(IndexStore::open_in_memory().unwrap()))
    }

    #[test]
    fn test_rebuild_from_scan() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("alpha.txt"), "a").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/beta.rs"), "b").unwrap();

        let indexer = indexer_for(vec![temp.path().to_path_buf()]);
        assert!(indexer.is_index_empty().unwrap());

        let report = indexer.rebuild_index_from_scan(&CancellationToken::new()).unwrap();
        assert_eq!(
            report.outcome,
            RebuildOutcome::Rebuilt {
                records: 2,
                generation: 1
            }
        );
        assert!(!indexer.is_index_empty().unwrap());

        let pager = indexer.search("BETA").unwrap();
        assert_eq!(pager.total(), 1);
        assert_eq!(pager.results()[0].name.as_str(), "beta.rs");
    }

    #[test]
    fn test_nothing_to_scan_keeps_index() {
        let temp = TempDir::new().unwrap();
        let indexer = indexer_for(vec![temp.path().join("missing")]);
        indexer
            .store()
            .rebuild(
                &[FileRecord::new("/kept.txt", 1, Default::default(), Default::default())],
                &CancellationToken::new(),
            )
            .unwrap();

        let report = indexer.rebuild_index_from_scan(&CancellationToken::new()).unwrap();
        assert_eq!(report.outcome, RebuildOutcome::NothingToScan);
        assert_eq!(report.records(), 0);
        assert_eq!(indexer.store().len().unwrap(), 1);
    }

    #[test]
    fn test_every_root_failing_keeps_index() {
        let temp = TempDir::new().unwrap();
        let indexer = indexer_for(Vec::new());
        indexer
            .store()
            .rebuild(
                &[FileRecord::new("/kept.txt", 1, Default::default(), Default::default())],
                &CancellationToken::new(),
            )
            .unwrap();

        let roots = vec![temp.path().join("vanished")];
        let err = indexer
            .rebuild_from_roots(&roots, &CancellationToken::new(), Instant::now())
            .unwrap_err();
        assert!(matches!(err, IndexError::Scan(ScanError::NotFound { .. })));
        assert_eq!(indexer.store().len().unwrap(), 1);
        assert_eq!(indexer.store().generation().unwrap(), 1);
    }

    #[test]
    fn test_blank_query_rejected() {
        let indexer = indexer_for(Vec::new());
        assert!(matches!(indexer.search("  "), Err(IndexError::Query(_))));
    }
}
