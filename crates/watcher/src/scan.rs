//! Snapshot traversal for one watched root

use crate::error::WatchError;
use crate::ignore::IgnorePolicy;
use lab_core::{FileRecord, Snapshot};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Result of listing one root
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Entries found under the root (the root itself included)
    pub snapshot: Snapshot,
    /// Non-fatal errors met below the root; traversal continued past them
    pub errors: Vec<WatchError>,
}

/// List `root` into a snapshot restricted to its subtree
///
/// Ignored directories are not descended into. The root itself is never
/// filtered: registering a hidden directory explicitly still watches it.
///
/// Returns `WatchError::RootNotFound` when the root no longer exists; every
/// other failure is collected into `ScanOutcome::errors`.
pub fn scan_root(
    root: &Path,
    recursive: bool,
    policy: &IgnorePolicy,
) -> Result<ScanOutcome, WatchError> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut outcome = ScanOutcome::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !policy.should_ignore_entry(e.path(), e.file_type().is_dir()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if is_not_found(&err) {
                    if err.depth() == 0 {
                        return Err(WatchError::RootNotFound(root.to_path_buf()));
                    }
                    // Entry vanished between readdir and stat; the next tick sees it gone
                    trace!("Entry vanished during scan: {:?}", err.path());
                    continue;
                }
                let path = err.path().unwrap_or(root).to_path_buf();
                debug!("Scan error under {}: {}", root.display(), err);
                outcome.errors.push(WatchError::Scan { path, source: err });
                continue;
            }
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) if is_not_found(&err) => continue,
            Err(err) => {
                outcome.errors.push(WatchError::Scan {
                    path: entry.path().to_path_buf(),
                    source: err,
                });
                continue;
            }
        };

        outcome
            .snapshot
            .insert(FileRecord::from_metadata(entry.path(), &metadata));
    }

    Ok(outcome)
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == ErrorKind::NotFound)
        .unwrap_or(false)
}
