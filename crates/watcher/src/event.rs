//! Watcher events and their frontend projection

use chrono::{DateTime, Utc};
use lab_core::{DataType, FileRecord, FileType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Kind of change an event describes
///
/// The diff engine only produces `Create`, `Remove` and `Rename`; the other
/// kinds exist for manually triggered events and consumers that share the
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Op {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
    Move,
}

impl Op {
    pub const ALL: [Op; 6] = [Op::Create, Op::Write, Op::Remove, Op::Rename, Op::Chmod, Op::Move];

    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Create => "CREATE",
            Op::Write => "WRITE",
            Op::Remove => "REMOVE",
            Op::Rename => "RENAME",
            Op::Chmod => "CHMOD",
            Op::Move => "MOVE",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Op {
    type Err = UnknownOp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownOp(s.to_string()))
    }
}

/// Returned when parsing an unknown operation name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOp(pub String);

/// A change observed by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Kind of change
    pub op: Op,
    /// Current path (new path for renames)
    pub path: PathBuf,
    /// Previous path, set for renames only
    pub old_path: Option<PathBuf>,
    /// Category derived from the extension of `path`
    pub file_type: FileType,
    /// File or directory
    pub data_type: DataType,
    /// Metadata of the entry (current state for create/rename, last seen for remove)
    pub record: FileRecord,
}

impl Event {
    /// Build an event, classifying `path` from its extension and the record
    pub fn new(op: Op, path: PathBuf, record: FileRecord) -> Self {
        Self {
            op,
            file_type: FileType::detect(&path),
            data_type: DataType::from_is_dir(record.is_dir),
            path,
            old_path: None,
            record,
        }
    }

    pub fn create(record: FileRecord) -> Self {
        Self::new(Op::Create, record.path.clone(), record)
    }

    pub fn remove(record: FileRecord) -> Self {
        Self::new(Op::Remove, record.path.clone(), record)
    }

    pub fn rename(old_path: PathBuf, record: FileRecord) -> Self {
        let mut event = Self::new(Op::Rename, record.path.clone(), record);
        event.old_path = Some(old_path);
        event
    }

    pub fn is_dir(&self) -> bool {
        self.record.is_dir
    }

    /// Rewrite the event for the UI, relative to `root`
    ///
    /// `path` is split into its parent directory (`.` for entries directly in
    /// the root) and the leaf name; separators become `/`. A path that is not
    /// under `root` is logged and kept as is.
    pub fn project(&self, root: &Path) -> FrontendEvent {
        let relative = relative_to(root, &self.path);
        let parent = relative
            .parent()
            .map(to_slash)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let file = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let old_path = self
            .old_path
            .as_deref()
            .map(|old| to_slash(&relative_to(root, old)))
            .unwrap_or_default();

        FrontendEvent {
            op: self.op,
            path: parent,
            old_path,
            file,
            file_type: self.file_type,
            data_type: self.data_type,
            name: self.record.name.clone(),
            size: self.record.size,
            mode: self.record.mode,
            mod_time: DateTime::<Utc>::from(self.record.mod_time),
            is_dir: self.record.is_dir,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() { "DIRECTORY" } else { "FILE" };
        write!(
            f,
            "{} {:?} {} {} {} [{}]",
            kind,
            self.record.name,
            self.op,
            self.file_type,
            self.data_type,
            self.path.display()
        )
    }
}

/// UI-facing form of an event, as serialized over the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendEvent {
    pub op: Op,
    /// Parent directory relative to the lab root, `/`-separated
    pub path: String,
    /// Previous relative path for renames, empty otherwise
    pub old_path: String,
    /// Leaf name of the entry
    pub file: String,
    pub file_type: FileType,
    pub data_type: DataType,
    pub name: String,
    pub size: u64,
    pub mode: u32,
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            warn!("{} is not under {}", path.display(), root.display());
            path.to_path_buf()
        }
    }
}

/// Join path components with `/` regardless of platform
fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            Component::Prefix(prefix) => out.push_str(&prefix.as_os_str().to_string_lossy()),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, size: u64) -> FileRecord {
        FileRecord::synthetic(path, size, 0o100644, false)
    }

    #[test]
    fn test_op_names_round_trip() {
        for op in Op::ALL {
            assert_eq!(op.as_str().parse::<Op>().unwrap(), op);
        }
        assert_eq!("rename".parse::<Op>().unwrap(), Op::Rename);
        assert!("TOUCH".parse::<Op>().is_err());
    }

    #[test]
    fn test_classification() {
        let event = Event::create(file("/lab/clip.mp4", 4));
        assert_eq!(event.file_type, FileType::Video);
        assert_eq!(event.data_type, DataType::File);

        let dir = Event::create(FileRecord::synthetic("/lab/graphs", 4096, 0o040755, true));
        assert_eq!(dir.data_type, DataType::Dir);
        assert_eq!(dir.file_type, FileType::Unsupported);
    }

    #[test]
    fn test_display() {
        let event = Event::create(file("/lab/a.json", 2));
        assert_eq!(event.to_string(), "FILE \"a.json\" CREATE GRAPH FILE [/lab/a.json]");
    }

    #[test]
    fn test_project_nested_create() {
        let event = Event::create(file("/lab/graphs/combo.json", 2));
        let projected = event.project(Path::new("/lab"));

        assert_eq!(projected.op, Op::Create);
        assert_eq!(projected.path, "graphs");
        assert_eq!(projected.file, "combo.json");
        assert_eq!(projected.old_path, "");
        assert_eq!(projected.file_type, FileType::Graph);
    }

    #[test]
    fn test_project_root_level_entry() {
        let event = Event::remove(file("/lab/a.json", 2));
        let projected = event.project(Path::new("/lab"));

        assert_eq!(projected.path, ".");
        assert_eq!(projected.file, "a.json");
        assert_eq!(projected.old_path, "");
    }

    #[test]
    fn test_project_rename() {
        let event = Event::rename(PathBuf::from("/lab/dir/a.json"), file("/lab/dir/b.json", 10));
        let projected = event.project(Path::new("/lab"));

        assert_eq!(projected.op, Op::Rename);
        assert_eq!(projected.old_path, "dir/a.json");
        assert_eq!(projected.path, "dir");
        assert_eq!(projected.file, "b.json");
    }

    #[test]
    fn test_project_outside_root_keeps_path() {
        let event = Event::create(file("/elsewhere/x.png", 1));
        let projected = event.project(Path::new("/lab"));

        assert_eq!(projected.path, "/elsewhere");
        assert_eq!(projected.file, "x.png");
    }

    #[test]
    fn test_frontend_json_shape() {
        let event = Event::rename(PathBuf::from("/lab/a.json"), file("/lab/b.json", 10));
        let json = serde_json::to_value(event.project(Path::new("/lab"))).unwrap();

        assert_eq!(json["op"], "RENAME");
        assert_eq!(json["path"], ".");
        assert_eq!(json["oldPath"], "a.json");
        assert_eq!(json["file"], "b.json");
        assert_eq!(json["fileType"], "GRAPH");
        assert_eq!(json["dataType"], "FILE");
        assert_eq!(json["name"], "b.json");
        assert_eq!(json["size"], 10);
        assert_eq!(json["isDir"], false);
        assert!(json["modTime"].is_string());
    }
}
