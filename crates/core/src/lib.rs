//! Core data model for Labwatch
//!
//! This crate provides the values shared by the watcher and its consumers:
//! - `FileRecord`: per-poll metadata for one filesystem entry
//! - `Snapshot`: path → record mapping captured at one poll tick
//! - `FileType` / `DataType`: extension and directory classification

pub mod filetype;
pub mod record;
pub mod snapshot;

pub use filetype::{DataType, FileType};
pub use record::FileRecord;
pub use snapshot::Snapshot;
