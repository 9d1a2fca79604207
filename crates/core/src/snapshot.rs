//! Snapshot of watched filesystem state

use crate::record::FileRecord;
use ahash::AHashMap;
use std::path::{Path, PathBuf};

/// Full observed state of the watched roots at one poll tick
///
/// Maps absolute path to the record captured for it, so a path can appear at
/// most once. Uses AHashMap (faster hashing for path keys).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: AHashMap<PathBuf, FileRecord>,
}

impl Snapshot {
    /// Create a new empty snapshot
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }

    /// Insert a record, keyed by its own path
    ///
    /// Returns the record previously stored under that path, if any.
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.entries.insert(record.path.clone(), record)
    }

    /// Get the record stored for a path
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.entries.get(path)
    }

    /// Check whether a path is present
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Remove the record stored for a path
    pub fn remove(&mut self, path: &Path) -> Option<FileRecord> {
        self.entries.remove(path)
    }

    /// Get the number of entries in the snapshot
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over `(path, record)` pairs in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileRecord)> {
        self.entries.iter()
    }

    /// Iterate over paths in unspecified order
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.keys()
    }

    /// Merge another snapshot into this one, overwriting shared paths
    pub fn merge(&mut self, other: Snapshot) {
        self.entries.extend(other.entries);
    }

    /// Remove every entry located at or below `root`
    ///
    /// Matching is component-wise: purging `/lab` leaves `/lab2` intact.
    /// Returns the number of entries removed.
    pub fn purge_under(&mut self, root: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| !path.starts_with(root));
        before - self.entries.len()
    }

    /// Keep only entries located at or below one of `roots`
    pub fn retain_under<'a, I>(&mut self, roots: I)
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let roots: Vec<&Path> = roots.into_iter().collect();
        self.entries
            .retain(|path, _| roots.iter().any(|root| path.starts_with(root)));
    }

    /// Copy of the entries located at or below `root`
    pub fn subtree(&self, root: &Path) -> Snapshot {
        let entries = self
            .entries
            .iter()
            .filter(|(path, _)| path.starts_with(root))
            .map(|(path, record)| (path.clone(), record.clone()))
            .collect();
        Snapshot { entries }
    }
}

impl FromIterator<FileRecord> for Snapshot {
    fn from_iter<T: IntoIterator<Item = FileRecord>>(iter: T) -> Self {
        let mut snapshot = Snapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

impl IntoIterator for Snapshot {
    type Item = (PathBuf, FileRecord);
    type IntoIter = std::collections::hash_map::IntoIter<PathBuf, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> FileRecord {
        FileRecord::synthetic(path, 1, 0o100644, false)
    }

    #[test]
    fn test_insert_is_keyed_by_path() {
        let mut snapshot = Snapshot::new();
        assert!(snapshot.insert(record("/lab/a.json")).is_none());
        assert!(snapshot.insert(record("/lab/a.json")).is_some());

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(Path::new("/lab/a.json")));
    }

    #[test]
    fn test_purge_under_is_component_wise() {
        let mut snapshot: Snapshot = ["/lab", "/lab/a.json", "/lab/dir/b.json", "/lab2/c.json"]
            .into_iter()
            .map(record)
            .collect();

        let removed = snapshot.purge_under(Path::new("/lab"));

        assert_eq!(removed, 3);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(Path::new("/lab2/c.json")));
    }

    #[test]
    fn test_retain_under_and_subtree() {
        let mut snapshot: Snapshot = ["/a/x", "/a/y", "/b/z", "/c/w"]
            .into_iter()
            .map(record)
            .collect();

        assert_eq!(snapshot.subtree(Path::new("/a")).len(), 2);

        snapshot.retain_under([Path::new("/a"), Path::new("/c")]);
        assert_eq!(snapshot.len(), 3);
        assert!(!snapshot.contains(Path::new("/b/z")));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut left: Snapshot = [record("/a/x")].into_iter().collect();
        let mut newer = FileRecord::synthetic("/a/x", 99, 0o100644, false);
        newer.name = "x".to_string();
        let right: Snapshot = [newer, record("/a/y")].into_iter().collect();

        left.merge(right);

        assert_eq!(left.len(), 2);
        assert_eq!(left.get(Path::new("/a/x")).unwrap().size, 99);
    }
}
