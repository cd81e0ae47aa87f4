//! Visited-directory tracking for link cycle detection.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use dashmap::DashSet;

/// Identity of a directory independent of the path used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirIdentity {
    /// Device and inode number.
    Inode { device: u64, inode: u64 },
    /// Canonical path, for platforms without inode numbers.
    Canonical(PathBuf),
}

impl DirIdentity {
    /// Identify a directory from its (followed) metadata.
    ///
    /// Returns `None` when no identity can be established, in which case the
    /// directory is walked without cycle protection.
    #[cfg(unix)]
    pub fn of(_path: &Path, metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self::Inode {
            device: metadata.dev(),
            inode: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn of(path: &Path, _metadata: &Metadata) -> Option<Self> {
        std::fs::canonicalize(path).ok().map(Self::Canonical)
    }
}

/// Tracks directories already walked so that symlink or junction cycles
/// terminate.
///
/// Backed by a concurrent set so one tracker can be shared by walkers
/// running on several threads.
#[derive(Debug, Default)]
pub struct InodeTracker {
    seen: DashSet<DirIdentity>,
}

impl InodeTracker {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Track a directory. Returns `true` if this is the first time seeing it.
    pub fn track(&self, identity: DirIdentity) -> bool {
        self.seen.insert(identity)
    }

    /// Get the number of directories tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_new_identity() {
        let tracker = InodeTracker::new();
        let id = DirIdentity::Inode { device: 1, inode: 12345 };

        assert!(tracker.track(id.clone()));
        assert!(!tracker.track(id)); // Second time returns false
    }

    #[test]
    fn test_different_devices() {
        let tracker = InodeTracker::new();
        assert!(tracker.track(DirIdentity::Inode { device: 1, inode: 12345 }));
        // Same inode, different device
        assert!(tracker.track(DirIdentity::Inode { device: 2, inode: 12345 }));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_track_canonical() {
        let tracker = InodeTracker::new();
        let id = DirIdentity::Canonical(PathBuf::from("C:\\Users"));
        assert!(tracker.track(id.clone()));
        assert!(!tracker.track(id));
        assert_eq!(tracker.len(), 1);
    }
}
