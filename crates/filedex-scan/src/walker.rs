//! Fault-isolating directory walker built on jwalk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::{Parallelism, WalkDirGeneric};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use filedex_core::{IndexConfig, ScanError, ScanWarning};

use crate::inode::{DirIdentity, InodeTracker};
use crate::progress::ProgressTracker;

/// Everything a walk could reach under one root.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Files found, in discovery order.
    pub files: Vec<PathBuf>,
    /// Directories and entries that were skipped.
    pub warnings: Vec<ScanWarning>,
    /// Number of directories visited.
    pub dirs_scanned: u64,
    /// Whether the walk stopped early because of cancellation.
    pub cancelled: bool,
    /// Set when the root itself could not be walked.
    pub root_error: Option<ScanError>,
}

/// Why a directory was yielded without descending into it.
#[derive(Debug, Clone, Default)]
enum Pruned {
    #[default]
    No,
    LinkCycle,
    OtherFilesystem,
}

/// Recursively enumerates files under a root.
///
/// A directory that cannot be listed is skipped together with its subtree;
/// siblings and ancestors are unaffected. Per-directory failures become
/// warnings and only an unusable root is reported as an error.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    follow_symlinks: bool,
    cross_filesystems: bool,
    include_hidden: bool,
    max_depth: Option<u32>,
    ignore: Arc<GlobSet>,
    progress: Option<ProgressTracker>,
}

impl DirectoryWalker {
    /// Create a walker with default settings.
    pub fn new() -> Self {
        Self::from_config(&IndexConfig::default())
    }

    /// Create a walker honouring the traversal options of `config`.
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            follow_symlinks: config.follow_symlinks,
            cross_filesystems: config.cross_filesystems,
            include_hidden: config.include_hidden,
            max_depth: config.max_depth,
            ignore: Arc::new(build_ignore_set(&config.ignore_patterns)),
            progress: None,
        }
    }

    /// Follow symbolic links into directories.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Allow the walk to leave the root's filesystem.
    pub fn cross_filesystems(mut self, cross: bool) -> Self {
        self.cross_filesystems = cross;
        self
    }

    pub(crate) fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Walk `root` until it is exhausted or `cancel` fires.
    pub fn walk(&self, root: &Path, cancel: &CancellationToken) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();

        let root_metadata = match fs::metadata(root) {
            Ok(metadata) if metadata.is_dir() => metadata,
            Ok(_) => {
                warn!("Skipping root {}: not a directory", root.display());
                outcome.root_error = Some(ScanError::NotADirectory {
                    path: root.to_path_buf(),
                });
                return outcome;
            }
            Err(err) => {
                warn!("Skipping root {}: {}", root.display(), err);
                outcome.root_error = Some(ScanError::io(root, err));
                return outcome;
            }
        };

        let visited = Arc::new(InodeTracker::new());
        if self.follow_symlinks {
            if let Some(identity) = DirIdentity::of(root, &root_metadata) {
                visited.track(identity);
            }
        }

        let walker = self.build(root, get_dev(&root_metadata), Arc::clone(&visited));

        for entry_result in walker {
            if cancel.is_cancelled() {
                debug!("Walk of {} cancelled", root.display());
                outcome.cancelled = true;
                break;
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    let warning = match err.io_error() {
                        Some(io_err) => {
                            if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                                debug!("Access denied listing {}", path.display());
                            } else {
                                warn!("Cannot read {}: {}", path.display(), io_err);
                            }
                            ScanWarning::read_error(&path, io_err)
                        }
                        None => {
                            debug!("Link loop at {}", path.display());
                            ScanWarning::link_cycle(&path)
                        }
                    };
                    self.skip(&mut outcome, warning);
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                // Unfollowed links land here and are indexed as entries
                self.push_file(&mut outcome, entry.path());
                continue;
            }

            match entry.client_state {
                Pruned::No => {
                    outcome.dirs_scanned += 1;
                    if let Some(progress) = &self.progress {
                        progress.record_dir();
                    }
                }
                Pruned::OtherFilesystem => debug!("Not crossing into {}", entry.path().display()),
                Pruned::LinkCycle => {
                    debug!("Already visited {}, not descending", entry.path().display());
                    self.skip(&mut outcome, ScanWarning::link_cycle(entry.path()));
                }
            }
        }

        debug!(
            "Walked {}: {} files, {} directories tracked",
            root.display(),
            outcome.files.len(),
            visited.len()
        );
        outcome
    }

    /// Configure jwalk for one root.
    ///
    /// Hidden entries and ignore matches are removed before they are yielded;
    /// directories on another device or already visited through a link are
    /// yielded but not read.
    fn build(&self, root: &Path, root_device: u64, visited: Arc<InodeTracker>) -> WalkDirGeneric<((), Pruned)> {
        let include_hidden = self.include_hidden;
        let cross_filesystems = self.cross_filesystems;
        let follow_symlinks = self.follow_symlinks;
        let ignore = Arc::clone(&self.ignore);

        WalkDirGeneric::<((), Pruned)>::new(root)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(follow_symlinks)
            .sort(true)
            .min_depth(0)
            .max_depth(self.max_depth.map(|d| d as usize).unwrap_or(usize::MAX))
            .process_read_dir(move |depth, _dir, _state, children| {
                // The first call carries the root entry itself
                if depth.is_none() {
                    return;
                }
                children.retain(|child| match child {
                    Ok(entry) => {
                        let hidden = !include_hidden && entry.file_name().to_string_lossy().starts_with('.');
                        !hidden && !ignore.is_match(entry.path())
                    }
                    Err(_) => true,
                });

                if cross_filesystems && !follow_symlinks {
                    return;
                }
                for entry in children.iter_mut().flatten() {
                    if !entry.file_type().is_dir() {
                        continue;
                    }
                    let path = entry.path();
                    let Ok(metadata) = fs::metadata(&path) else {
                        continue;
                    };
                    if !cross_filesystems && get_dev(&metadata) != root_device {
                        entry.read_children_path = None;
                        entry.client_state = Pruned::OtherFilesystem;
                    } else if follow_symlinks {
                        let first = DirIdentity::of(&path, &metadata).is_none_or(|id| visited.track(id));
                        if !first {
                            entry.read_children_path = None;
                            entry.client_state = Pruned::LinkCycle;
                        }
                    }
                }
            })
    }

    fn push_file(&self, outcome: &mut WalkOutcome, path: PathBuf) {
        if let Some(progress) = &self.progress {
            progress.record_file(&path);
        }
        outcome.files.push(path);
    }

    fn skip(&self, outcome: &mut WalkOutcome, warning: ScanWarning) {
        if let Some(progress) = &self.progress {
            progress.record_error();
        }
        outcome.warnings.push(warning);
    }
}

impl Default for DirectoryWalker {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile glob patterns, dropping (and logging) invalid ones.
pub(crate) fn build_ignore_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => error!("Invalid glob pattern '{}': {}", pattern, e),
        }
    }
    builder.build().unwrap_or_else(|e| {
        error!("Failed to build ignore set: {}", e);
        GlobSet::empty()
    })
}

/// Get the device ID from metadata.
#[cfg(unix)]
fn get_dev(metadata: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.dev()
}

#[cfg(not(unix))]
fn get_dev(_metadata: &fs::Metadata) -> u64 {
    0 // Volumes are walked separately; no device ids to compare
}
