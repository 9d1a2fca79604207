//! Per-entry filesystem metadata

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Metadata for one filesystem entry, captured during a single poll
///
/// Records are produced fresh on every tick and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Final path component (file or directory name)
    pub name: String,
    /// Absolute path of the entry (the snapshot key)
    pub path: PathBuf,
    /// Size in bytes as reported by the filesystem
    pub size: u64,
    /// Mode bits (Unix `st_mode`, synthesized on Windows)
    pub mode: u32,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Last modification time
    pub mod_time: SystemTime,
}

impl FileRecord {
    /// Build a record from metadata read off the filesystem
    ///
    /// The metadata is expected to come from `symlink_metadata` so that links
    /// are recorded as themselves rather than their targets.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        Self {
            name: file_name(path),
            path: path.to_path_buf(),
            size: metadata.len(),
            mode: mode_bits(metadata),
            is_dir: metadata.is_dir(),
            // Some platforms cannot report mtime; fall back to the epoch
            mod_time: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }

    /// Create a record without touching the filesystem
    pub fn synthetic(path: impl Into<PathBuf>, size: u64, mode: u32, is_dir: bool) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
            size,
            mode,
            is_dir,
            mod_time: SystemTime::now(),
        }
    }

    /// Structural equality used to pair a removed path with a created one
    ///
    /// Compares size, mode and the directory flag only. Two distinct files of
    /// identical size and mode are considered the same.
    pub fn same_file(&self, other: &FileRecord) -> bool {
        self.size == other.size && self.mode == other.mode && self.is_dir == other.is_dir
    }

    /// Parent directory of the recorded path
    pub fn parent(&self) -> Option<&Path> {
        self.path.parent()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(unix)]
fn mode_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(metadata: &Metadata) -> u32 {
    // Mirror the Unix layout so records compare the same way everywhere
    let perm = if metadata.permissions().readonly() { 0o444 } else { 0o666 };
    if metadata.is_dir() {
        0o040000 | perm | 0o111
    } else {
        0o100000 | perm
    }
}
