//! File-type classification for Lab documents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Semantic category of a Lab document, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    /// Flowchart graph stored as JSON
    Graph,
    /// Spreadsheet document
    Sheet,
    /// Video clip
    Video,
    /// Still image
    Image,
    /// Anything the application cannot open
    Unsupported,
}

impl FileType {
    /// Classify an extension (with or without the leading dot)
    ///
    /// Matching is case-insensitive.
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "png" | "jpeg" | "gif" | "webp" => FileType::Image,
            "json" => FileType::Graph,
            "mp4" | "mpeg" => FileType::Video,
            _ => FileType::Unsupported,
        }
    }

    /// Classify a path by its extension
    pub fn detect(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(FileType::Unsupported)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Graph => "GRAPH",
            FileType::Sheet => "SHEET",
            FileType::Video => "VIDEO",
            FileType::Image => "IMAGE",
            FileType::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Whether an entry is a plain file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    File,
    Dir,
}

impl DataType {
    pub fn from_is_dir(is_dir: bool) -> Self {
        if is_dir {
            DataType::Dir
        } else {
            DataType::File
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::File => "FILE",
            DataType::Dir => "DIR",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
