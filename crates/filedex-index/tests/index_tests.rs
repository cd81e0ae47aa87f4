//! Integration tests for filedex-index.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use filedex_core::{FileRecord, IndexConfig, RecordId};
use filedex_index::{IndexError, IndexStore, Indexer, RebuildOutcome, SearchEngine};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn record(path: &str, size: u64) -> FileRecord {
    FileRecord::new(path, size, at(1_650_000_000), at(1_600_000_000))
}

fn paths(records: &[FileRecord]) -> Vec<PathBuf> {
    records.iter().map(|r| r.path.clone()).collect()
}

fn file_store(temp: &TempDir) -> Arc<IndexStore> {
    Arc::new(IndexStore::open(temp.path().join("db").join("index.db")).unwrap())
}

#[test]
fn test_single_letter_query_finds_only_matching_path() {
    let store = Arc::new(IndexStore::open_in_memory().unwrap());
    store
        .rebuild(
            &[record("/a/x.txt", 10), record("/a/b/y.log", 2048), record("/c/z.txt", 0)],
            &CancellationToken::new(),
        )
        .unwrap();

    let results = SearchEngine::new(store).search("z").unwrap();
    assert_eq!(paths(&results), vec![PathBuf::from("/c/z.txt")]);
    assert_eq!(results[0].size, 0);
    assert_eq!(results[0].id, RecordId(3));
}

#[test]
fn test_empty_rebuild_leaves_empty_index() {
    let temp = TempDir::new().unwrap();
    let store = file_store(&temp);
    store.rebuild(&[record("/old.txt", 1)], &CancellationToken::new()).unwrap();
    store.rebuild(&[], &CancellationToken::new()).unwrap();

    assert!(store.is_empty().unwrap());
    let engine = SearchEngine::new(store);
    for query in ["old", "o", "txt", "/"] {
        assert!(engine.search(query).unwrap().is_empty(), "query {query:?}");
    }
}

#[test]
fn test_pages_of_large_result() {
    let records: Vec<FileRecord> = (0..250)
        .map(|i| record(&format!("/photos/img_{i:04}.jpg"), i))
        .collect();
    let store = Arc::new(IndexStore::open_in_memory().unwrap());
    store.rebuild(&records, &CancellationToken::new()).unwrap();

    let config = IndexConfig::builder().page_size(100usize).build().unwrap();
    let indexer = Indexer::with_store(config, store);
    let mut pager = indexer.search("IMG_").unwrap();

    assert_eq!(pager.total(), 250);
    assert_eq!(pager.page_count(), 3);
    assert_eq!(pager.next_page().len(), 100);
    assert_eq!(pager.next_page().len(), 100);
    assert_eq!(pager.next_page().len(), 50);
    assert!(pager.next_page().is_empty());
    assert!(!pager.has_more());

    // Same page twice gives the same records
    assert_eq!(pager.page(1), pager.page(1));
    assert!(pager.page(7).is_empty());
}

#[test]
fn test_every_path_substring_finds_its_record() {
    let records = vec![
        record("/home/ana/Documents/Taxes 2023.xlsx", 5),
        record("/srv/backup/db-dump.sql.gz", 9),
        record("/mnt/data/média/clip.mp4", 7),
    ];
    let store = Arc::new(IndexStore::open_in_memory().unwrap());
    store.rebuild(&records, &CancellationToken::new()).unwrap();
    let engine = SearchEngine::new(store);

    for (i, path) in records.iter().map(|r| r.path_str().into_owned()).enumerate() {
        let chars: Vec<char> = path.chars().collect();
        for (start, len) in [(0, 4), (1, 1), (5, 2), (chars.len() - 6, 6)] {
            let needle: String = chars[start..start + len].iter().collect();
            if needle.trim().is_empty() {
                continue;
            }
            let found = engine.search(&needle.to_lowercase()).unwrap();
            assert!(
                found.iter().any(|r| r.id == RecordId(i as u64 + 1)),
                "{needle:?} should find {path}"
            );
        }
    }
}

#[test]
fn test_ids_restart_and_generation_increments() {
    let temp = TempDir::new().unwrap();
    let store = file_store(&temp);
    let cancel = CancellationToken::new();

    store.rebuild(&[record("/one", 1), record("/two", 2)], &cancel).unwrap();
    assert_eq!(store.generation().unwrap(), 1);
    store.rebuild(&[record("/three", 3)], &cancel).unwrap();
    assert_eq!(store.generation().unwrap(), 2);

    let first = store.lookup_by_id(RecordId(1)).unwrap().unwrap();
    assert_eq!(first.path, PathBuf::from("/three"));
    assert!(store.lookup_by_id(RecordId(2)).unwrap().is_none());
}

#[test]
fn test_cancelled_rebuild_keeps_previous_generation() {
    let temp = TempDir::new().unwrap();
    let store = file_store(&temp);
    store.rebuild(&[record("/keep/report.pdf", 1)], &CancellationToken::new()).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = store
        .rebuild(&[record("/replacement.pdf", 1)], &cancel)
        .unwrap_err();
    assert!(matches!(err, IndexError::Cancelled));

    assert_eq!(store.generation().unwrap(), 1);
    let results = SearchEngine::new(store).search("report").unwrap();
    assert_eq!(paths(&results), vec![PathBuf::from("/keep/report.pdf")]);
}

#[test]
fn test_index_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");
    {
        let store = IndexStore::open(&path).unwrap();
        store.rebuild(&[record("/persist/me.txt", 4)], &CancellationToken::new()).unwrap();
    }

    let store = IndexStore::open(&path).unwrap();
    assert_eq!(store.path(), Some(path.as_path()));
    assert_eq!(store.len().unwrap(), 1);
    let found = store.lookup_by_id(RecordId(1)).unwrap().unwrap();
    assert_eq!(found.size, 4);
    assert_eq!(found.modified_at, at(1_650_000_000));
    assert_eq!(found.created_at, at(1_600_000_000));
}

#[test]
fn test_searches_see_whole_generations_during_rebuild() {
    let temp = TempDir::new().unwrap();
    let store = file_store(&temp);
    let old: Vec<FileRecord> = (0..50).map(|i| record(&format!("/gen/old_{i}.dat"), 1)).collect();
    let new: Vec<FileRecord> = (0..5000).map(|i| record(&format!("/gen/new_{i}.dat"), 1)).collect();
    store.rebuild(&old, &CancellationToken::new()).unwrap();

    let reader = {
        let engine = SearchEngine::new(Arc::clone(&store));
        thread::spawn(move || {
            let mut sizes = HashSet::new();
            for _ in 0..50 {
                sizes.insert(engine.search("/gen/").unwrap().len());
            }
            sizes
        })
    };

    store.rebuild(&new, &CancellationToken::new()).unwrap();
    let sizes = reader.join().unwrap();
    assert!(sizes.iter().all(|n| *n == 50 || *n == 5000), "saw {sizes:?}");
}

#[test]
fn test_rebuild_index_from_scan_on_disk() {
    let data = TempDir::new().unwrap();
    fs::create_dir_all(data.path().join("projects/filedex")).unwrap();
    fs::write(data.path().join("projects/filedex/Cargo.toml"), "[package]").unwrap();
    fs::write(data.path().join("projects/notes.md"), "# notes").unwrap();

    let db = TempDir::new().unwrap();
    let config = IndexConfig::builder()
        .roots(vec![data.path().to_path_buf()])
        .database_path(db.path().join("index.db"))
        .build()
        .unwrap();
    let indexer = Indexer::open(config).unwrap();
    assert!(indexer.is_index_empty().unwrap());

    let report = indexer.rebuild_index_from_scan(&CancellationToken::new()).unwrap();
    assert!(matches!(report.outcome, RebuildOutcome::Rebuilt { records: 2, .. }));
    assert_eq!(report.roots, vec![data.path().to_path_buf()]);
    assert!(report.warnings.is_empty());

    let pager = indexer.search("cargo").unwrap();
    assert_eq!(pager.total(), 1);
    assert_eq!(pager.results()[0].extension.as_str(), ".toml");
}

#[test]
fn test_cancelled_scan_keeps_index() {
    let data = TempDir::new().unwrap();
    fs::write(data.path().join("fresh.txt"), "x").unwrap();

    let store = Arc::new(IndexStore::open_in_memory().unwrap());
    store.rebuild(&[record("/previous.txt", 1)], &CancellationToken::new()).unwrap();
    let indexer = Indexer::with_store(IndexConfig::with_roots(vec![data.path()]), store);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = indexer.rebuild_index_from_scan(&cancel).unwrap_err();
    assert!(matches!(err, IndexError::Cancelled));
    assert_eq!(indexer.search("previous").unwrap().total(), 1);
}

#[tokio::test]
async fn test_search_pages_streams_batches() {
    let records: Vec<FileRecord> = (0..250).map(|i| record(&format!("/logs/{i}.log"), 1)).collect();
    let store = Arc::new(IndexStore::open_in_memory().unwrap());
    store.rebuild(&records, &CancellationToken::new()).unwrap();
    let indexer = Indexer::with_store(IndexConfig::default(), store);

    let mut rx = indexer.search_pages(".log").unwrap();
    let mut sizes = Vec::new();
    while let Some(page) = rx.recv().await {
        sizes.push(page.len());
    }
    assert_eq!(sizes, vec![100, 100, 50]);

    assert!(matches!(indexer.search_pages(" "), Err(IndexError::Query(_))));
}
