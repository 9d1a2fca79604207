//! Error type for the watcher

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the watcher API or reported on its error channel
#[derive(Debug, Error)]
pub enum WatchError {
    /// `start` was called with an interval below the minimum resolution
    #[error("poll interval {0:?} is less than 1ns")]
    DurationTooShort(Duration),

    /// `start` was called while a previous run has not been closed
    #[error("watcher is already running")]
    AlreadyRunning,

    /// A registered root disappeared; it has been deregistered
    #[error("watched file or folder deleted: {}", .0.display())]
    RootDeleted(PathBuf),

    /// A path passed to `add_root` does not exist
    #[error("path not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Traversal failure below a root (permission denied, transient read error)
    #[error("failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// I/O failure outside of traversal (e.g. resolving the working directory)
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid gitignore-style pattern
    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] ::ignore::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WatchError {
    /// Whether this is the signal that a watched root was deleted
    pub fn is_root_deleted(&self) -> bool {
        matches!(self, WatchError::RootDeleted(_))
    }

    /// Path associated with the error, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            WatchError::RootDeleted(path) | WatchError::RootNotFound(path) => Some(path),
            WatchError::Scan { path, .. } | WatchError::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result alias used throughout the watcher crate
pub type Result<T> = std::result::Result<T, WatchError>;
