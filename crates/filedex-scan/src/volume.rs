//! Storage volume discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Filesystem types that never hold user files.
#[cfg(unix)]
const PSEUDO_FILESYSTEMS: &[&str] = &[
    "autofs", "binfmt_misc", "bpf", "cgroup", "cgroup2", "configfs", "debugfs", "devpts",
    "devtmpfs", "efivarfs", "fusectl", "hugetlbfs", "mqueue", "nsfs", "proc", "pstore",
    "ramfs", "rpc_pipefs", "securityfs", "selinuxfs", "squashfs", "sysfs", "tmpfs", "tracefs",
    "devfs",
];

/// Filesystem types served over the network.
#[cfg(unix)]
const NETWORK_FILESYSTEMS: &[&str] = &["nfs", "nfs4", "cifs", "smbfs", "smb3", "fuse.sshfs", "9p"];

/// How a volume is attached to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    /// Internal disk.
    Fixed,
    /// USB sticks, card readers, optical media.
    Removable,
    /// Network share.
    Network,
    /// Anything the platform does not classify.
    Unknown,
}

/// A candidate root reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// Mount point or drive root.
    pub root: PathBuf,
    /// Attachment kind.
    pub kind: VolumeKind,
}

impl Volume {
    /// Create a volume description.
    pub fn new(root: impl Into<PathBuf>, kind: VolumeKind) -> Self {
        Self {
            root: root.into(),
            kind,
        }
    }

    /// Whether the root is currently present as a directory.
    pub fn is_ready(&self) -> bool {
        fs::metadata(&self.root).is_ok_and(|m| m.is_dir())
    }
}

/// Lists the volumes that can actually be indexed.
#[derive(Debug, Clone, Default)]
pub struct VolumeEnumerator {
    candidates: Option<Vec<Volume>>,
}

impl VolumeEnumerator {
    /// Enumerate the host's volumes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate a fixed candidate list instead of the host's volumes.
    pub fn with_candidates<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            candidates: Some(
                roots
                    .into_iter()
                    .map(|root| Volume::new(root, VolumeKind::Unknown))
                    .collect(),
            ),
        }
    }

    /// Every volume the platform reports, before any filtering.
    pub fn candidates(&self) -> Vec<Volume> {
        match &self.candidates {
            Some(volumes) => volumes.clone(),
            None => system_volumes(),
        }
    }

    /// Roots that are fixed or ready and whose root directory can be listed.
    ///
    /// Volumes failing the trial listing are left out, as are bind mounts
    /// that a walk of an enclosing root on the same device already covers.
    /// An empty result means there is nothing to index.
    pub fn list_accessible_volumes(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for volume in self.candidates() {
            if volume.kind != VolumeKind::Fixed && !volume.is_ready() {
                debug!("Volume {} not ready, skipping", volume.root.display());
                continue;
            }
            match trial_listing(&volume.root) {
                Ok(()) => {
                    if !roots.contains(&volume.root) {
                        roots.push(volume.root);
                    }
                }
                Err(err) => {
                    debug!("Volume {} not accessible: {}", volume.root.display(), err);
                }
            }
        }

        let with_devices = roots
            .into_iter()
            .map(|root| {
                let device = device_of(&root);
                (root, device)
            })
            .collect();
        collapse_nested_mounts(with_devices)
    }
}

/// Drop roots that sit under another root on the same device.
///
/// A walk never leaves its root's device unless asked to, so a nested root
/// on a different device is kept while a bind mount of part of the same
/// device is walked once, through the enclosing root. Roots without a known
/// device are always kept.
pub(crate) fn collapse_nested_mounts(roots: Vec<(PathBuf, Option<u64>)>) -> Vec<PathBuf> {
    roots
        .iter()
        .filter(|(root, device)| {
            let covered = device.is_some()
                && roots.iter().any(|(outer, outer_device)| {
                    outer != root && root.starts_with(outer) && outer_device == device
                });
            if covered {
                debug!("Volume {} is covered by an enclosing root", root.display());
            }
            !covered
        })
        .map(|(root, _)| root.clone())
        .collect()
}

#[cfg(unix)]
fn device_of(root: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(root).ok().map(|m| m.dev())
}

#[cfg(not(unix))]
fn device_of(_root: &Path) -> Option<u64> {
    None
}

/// List a root directory and read its first entry.
fn trial_listing(root: &Path) -> io::Result<()> {
    let mut entries = fs::read_dir(root)?;
    if let Some(Err(err)) = entries.next() {
        return Err(err);
    }
    Ok(())
}

/// Remove roots that are nested under other roots in the list.
pub fn non_overlapping_roots(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for root in roots {
        if result.iter().any(|kept| root.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !kept.starts_with(&root));
        result.push(root);
    }

    result
}

#[cfg(windows)]
fn system_volumes() -> Vec<Volume> {
    (b'A'..=b'Z')
        .map(|letter| Volume::new(format!("{}:\\", letter as char), VolumeKind::Unknown))
        .filter(|volume| volume.root.exists())
        .collect()
}

#[cfg(unix)]
fn system_volumes() -> Vec<Volume> {
    for table in ["/proc/self/mounts", "/etc/mtab"] {
        if let Ok(text) = fs::read_to_string(table) {
            let volumes = parse_mount_table(&text);
            if !volumes.is_empty() {
                return volumes;
            }
        }
    }
    debug!("No readable mount table, falling back to /");
    vec![Volume::new("/", VolumeKind::Fixed)]
}

#[cfg(not(any(unix, windows)))]
fn system_volumes() -> Vec<Volume> {
    Vec::new()
}

/// Parse `/proc/mounts`-format text into volumes, dropping pseudo filesystems.
#[cfg(unix)]
pub(crate) fn parse_mount_table(text: &str) -> Vec<Volume> {
    let mut volumes: Vec<Volume> = Vec::new();

    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let (Some(device), Some(mount_point), Some(fs_type)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        if is_pseudo_filesystem(fs_type) {
            continue;
        }

        let root = PathBuf::from(unescape_mount_field(mount_point));
        if volumes.iter().any(|v| v.root == root) {
            continue;
        }

        volumes.push(Volume::new(root, classify(device, mount_point, fs_type)));
    }

    volumes
}

#[cfg(unix)]
fn is_pseudo_filesystem(fs_type: &str) -> bool {
    PSEUDO_FILESYSTEMS.contains(&fs_type) || fs_type.starts_with("cgroup")
}

#[cfg(unix)]
fn classify(device: &str, mount_point: &str, fs_type: &str) -> VolumeKind {
    if NETWORK_FILESYSTEMS.contains(&fs_type) {
        VolumeKind::Network
    } else if mount_point.starts_with("/media/") || mount_point.starts_with("/run/media/") {
        VolumeKind::Removable
    } else if device.starts_with("/dev/") {
        VolumeKind::Fixed
    } else {
        VolumeKind::Unknown
    }
}

/// Decode the octal escapes (`\040` for space) used in mount tables.
#[cfg(unix)]
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or_default();
            if let Ok(value) = u8::from_str_radix(digits, 8) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
