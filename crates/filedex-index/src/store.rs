//! SQLite-backed record store with a trigram full-text index over paths.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use filedex_core::{FileRecord, RecordId};

use crate::error::{IndexError, Result};

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA cache_size = -64000;
     PRAGMA mmap_size = 268435456;
     PRAGMA busy_timeout = 5000;";

const CREATE_META: &str = "CREATE TABLE IF NOT EXISTS index_meta (
         key TEXT PRIMARY KEY,
         value INTEGER NOT NULL
     );
     INSERT OR IGNORE INTO index_meta (key, value) VALUES ('generation', 0);";

const CREATE_RECORDS: &str = "CREATE TABLE IF NOT EXISTS file_record (
         id INTEGER PRIMARY KEY,
         path BLOB NOT NULL,
         name TEXT NOT NULL,
         extension TEXT NOT NULL,
         size INTEGER NOT NULL,
         modified_at INTEGER NOT NULL,
         created_at INTEGER NOT NULL
     );
     CREATE VIRTUAL TABLE IF NOT EXISTS file_record_fts USING fts5(
         path_folded,
         record_id UNINDEXED,
         tokenize = 'trigram'
     );";

const DROP_RECORDS: &str = "DROP TABLE IF EXISTS file_record_fts;
     DROP TABLE IF EXISTS file_record;";

/// Columns selected when reading a [`FileRecord`] back.
pub(crate) const RECORD_COLUMNS: &str =
    "r.id, r.path, r.name, r.extension, r.size, r.modified_at, r.created_at";

/// What a committed rebuild wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildCommit {
    /// Records written, with ids `1..=records`.
    pub records: usize,
    /// Generation the rebuild committed.
    pub generation: u64,
}

enum Location {
    File(PathBuf),
    Memory,
}

/// The persistent index.
///
/// One generation of records is visible at a time. [`IndexStore::rebuild`]
/// replaces it atomically: readers see either the previous generation or
/// the new one, never a mix.
///
/// File-backed stores hand every reader its own connection, so searches run
/// concurrently with each other and with a rebuild. In-memory stores share
/// the writer connection.
pub struct IndexStore {
    location: Location,
    writer: Mutex<Connection>,
    rebuild_lock: Mutex<()>,
}

impl IndexStore {
    /// Open or create the index at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| IndexError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        configure(&conn)?;
        init_schema(&conn)?;
        debug!("Opened index at {}", path.display());

        Ok(Self {
            location: Location::File(path.to_path_buf()),
            writer: Mutex::new(conn),
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Open a private in-memory index.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        init_schema(&conn)?;

        Ok(Self {
            location: Location::Memory,
            writer: Mutex::new(conn),
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Whether the current generation holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        self.with_reader(|conn| {
            let exists: bool =
                conn.query_row("SELECT EXISTS (SELECT 1 FROM file_record)", [], |row| row.get(0))?;
            Ok(!exists)
        })
    }

    /// Number of records in the current generation.
    pub fn len(&self) -> Result<usize> {
        self.with_reader(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM file_record", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    /// Generation counter; incremented by every committed rebuild.
    pub fn generation(&self) -> Result<u64> {
        self.with_reader(|conn| read_generation(conn))
    }

    /// Fetch one record of the current generation.
    pub fn lookup_by_id(&self, id: RecordId) -> Result<Option<FileRecord>> {
        self.with_reader(|conn| lookup(conn, id))
    }

    /// Replace the whole index with `records`.
    ///
    /// Records receive ids `1..=n` in input order. Everything happens in one
    /// transaction; if it fails or `cancel` fires, it is rolled back and the
    /// previous generation stays in place.
    pub fn rebuild(&self, records: &[FileRecord], cancel: &CancellationToken) -> Result<RebuildCommit> {
        let _rebuild = match self.rebuild_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(IndexError::RebuildInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if cancel.is_cancelled() {
            info!("Rebuild cancelled before it started");
            return Err(IndexError::Cancelled);
        }

        let start = Instant::now();
        let mut conn = lock(&self.writer);
        let tx = conn.transaction()?;

        tx.execute_batch(DROP_RECORDS)?;
        tx.execute_batch(CREATE_RECORDS)?;

        {
            let mut insert_record = tx.prepare(
                "INSERT INTO file_record (id, path, name, extension, size, modified_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut insert_fts =
                tx.prepare("INSERT INTO file_record_fts (path_folded, record_id) VALUES (?1, ?2)")?;

            for (index, record) in records.iter().enumerate() {
                if cancel.is_cancelled() {
                    info!("Rebuild cancelled after {} of {} records", index, records.len());
                    return Err(IndexError::Cancelled);
                }
                let id = index as i64 + 1;
                let path = path_to_bytes(&record.path);
                let path: &[u8] = &path;
                insert_record.execute(params![
                    id,
                    path,
                    record.name.as_str(),
                    record.extension.as_str(),
                    record.size as i64,
                    record.modified_at.timestamp_micros(),
                    record.created_at.timestamp_micros(),
                ])?;
                insert_fts.execute(params![record.path_str().to_lowercase(), id])?;
            }
        }

        tx.execute(
            "UPDATE index_meta SET value = value + 1 WHERE key = 'generation'",
            [],
        )?;
        let generation = read_generation(&tx)?;

        if cancel.is_cancelled() {
            info!("Rebuild cancelled before commit");
            return Err(IndexError::Cancelled);
        }
        tx.commit()?;

        info!(
            "Index rebuilt: {} records, generation {} in {:.2}s",
            records.len(),
            generation,
            start.elapsed().as_secs_f64()
        );
        Ok(RebuildCommit {
            records: records.len(),
            generation,
        })
    }

    /// Run `f` against a connection that sees only committed generations.
    pub(crate) fn with_reader<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        match &self.location {
            Location::File(path) => {
                let conn = Connection::open(path)?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                f(&conn)
            }
            Location::Memory => {
                let conn = lock(&self.writer);
                f(&conn)
            }
        }
    }
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(PRAGMAS)?;
    debug!("SQLite pragmas configured (WAL mode, 64MB cache, 256MB mmap)");
    Ok(())
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_META)?;
    conn.execute_batch(CREATE_RECORDS)?;
    Ok(())
}

fn read_generation(conn: &Connection) -> Result<u64> {
    let value: i64 = conn.query_row(
        "SELECT value FROM index_meta WHERE key = 'generation'",
        [],
        |row| row.get(0),
    )?;
    Ok(value as u64)
}

fn lookup(conn: &Connection, id: RecordId) -> Result<Option<FileRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM file_record r WHERE r.id = ?1");
    let record = conn
        .query_row(&sql, [id.0 as i64], record_from_row)
        .optional()?;
    Ok(record)
}

/// Decode a row selected with [`RECORD_COLUMNS`].
pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let id: i64 = row.get(0)?;
    let path: Vec<u8> = row.get(1)?;
    let name: String = row.get(2)?;
    let extension: String = row.get(3)?;
    let size: i64 = row.get(4)?;
    let modified_at: i64 = row.get(5)?;
    let created_at: i64 = row.get(6)?;

    Ok(FileRecord {
        id: RecordId::new(id as u64),
        path: path_from_bytes(path),
        name: name.into(),
        extension: extension.into(),
        size: size as u64,
        modified_at: from_micros(modified_at),
        created_at: from_micros(created_at),
    })
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

/// Raw path bytes as stored in `file_record.path`.
#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
        Cow::Owned(text) => Cow::Owned(text.into_bytes()),
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}
