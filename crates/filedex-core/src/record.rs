//! Indexed file record types.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the index store.
///
/// Ids are scoped to a single index generation: every rebuild restarts them
/// at 1, so an id must never be kept across rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Placeholder id carried by records that have not been stored yet.
    pub const UNASSIGNED: RecordId = RecordId(0);

    /// Create a new RecordId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Whether the store has assigned this id.
    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One file as it looked when the index was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Store-assigned identifier.
    pub id: RecordId,

    /// Absolute path of the file.
    pub path: PathBuf,

    /// File name (last path component).
    pub name: CompactString,

    /// Extension including the leading dot, or empty.
    pub extension: CompactString,

    /// Size in bytes.
    pub size: u64,

    /// Last modification time.
    pub modified_at: DateTime<Utc>,

    /// Creation time. Not guaranteed to precede `modified_at`.
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Create an unstored record, deriving name and extension from `path`.
    pub fn new(
        path: impl Into<PathBuf>,
        size: u64,
        modified_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        let extension = extension_of(&path);
        Self {
            id: RecordId::UNASSIGNED,
            path,
            name,
            extension,
            size,
            modified_at,
            created_at,
        }
    }

    /// Create an unstored record from `SystemTime` timestamps.
    pub fn from_system_times(
        path: impl Into<PathBuf>,
        size: u64,
        modified: SystemTime,
        created: SystemTime,
    ) -> Self {
        Self::new(path, size, modified.into(), created.into())
    }

    /// Path as UTF-8 text (lossy for non UTF-8 paths).
    pub fn path_str(&self) -> std::borrow::Cow<'_, str> {
        self.path.to_string_lossy()
    }
}

fn file_name_of(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_default()
}

fn extension_of(path: &Path) -> CompactString {
    match path.extension() {
        Some(ext) => {
            let mut out = CompactString::new(".");
            out.push_str(&ext.to_string_lossy());
            out
        }
        None => CompactString::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from(std::time::UNIX_EPOCH)
    }

    #[test]
    fn test_name_and_extension_derived() {
        let record = FileRecord::new("/a/b/report.final.pdf", 10, epoch(), epoch());
        assert_eq!(record.name.as_str(), "report.final.pdf");
        assert_eq!(record.extension.as_str(), ".pdf");
        assert_eq!(record.id, RecordId::UNASSIGNED);
    }

    #[test]
    fn test_no_extension() {
        let record = FileRecord::new("/etc/hostname", 0, epoch(), epoch());
        assert_eq!(record.name.as_str(), "hostname");
        assert!(record.extension.is_empty());

        // Dotfiles have a name but no extension
        let dotfile = FileRecord::new("/home/u/.bashrc", 0, epoch(), epoch());
        assert!(dotfile.extension.is_empty());
    }
}
