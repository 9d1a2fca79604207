//! Lab path sources
//!
//! The lab directory is chosen by the user at runtime, so the watcher can be
//! constructed before it is known. `Watcher::start_lab` polls a source until
//! it yields a path.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

/// Supplies the lab path once it is known
pub trait LabPathSource: Send + Sync {
    /// Current lab path; `None` or an empty path means "not configured yet"
    fn lab_path(&self) -> Option<PathBuf>;
}

impl<F> LabPathSource for F
where
    F: Fn() -> Option<PathBuf> + Send + Sync,
{
    fn lab_path(&self) -> Option<PathBuf> {
        self()
    }
}

/// In-memory lab path shared between the settings side and the watcher
#[derive(Debug, Clone, Default)]
pub struct SharedLabPath {
    inner: Arc<RwLock<Option<PathBuf>>>,
}

impl SharedLabPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: impl Into<PathBuf>) {
        *self.inner.write() = Some(path.into());
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

impl LabPathSource for SharedLabPath {
    fn lab_path(&self) -> Option<PathBuf> {
        self.inner.read().clone()
    }
}

/// Normalize a source value: empty paths count as unset
pub(crate) fn configured(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}
