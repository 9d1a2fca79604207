//! Polling file system watcher for the Lab
//!
//! This crate detects creations, deletions and renames under a set of watched
//! roots by periodically listing them and diffing consecutive snapshots:
//! - No native notification backend; portable by construction
//! - Rename detection by pairing removed/created entries in the same directory
//! - Rendezvous channels for events and errors (consumer backpressure)
//! - Cancellable poll loop with an explicit closed signal
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//! use watcher::Watcher;
//!
//! let watcher = Arc::new(Watcher::new());
//! watcher.add_root("/home/user/Lab", true)?;
//!
//! let runner = Arc::clone(&watcher);
//! thread::spawn(move || runner.start(Duration::from_millis(500)));
//!
//! for event in watcher.events() {
//!     println!("{}", event);
//! }
//! # Ok::<(), watcher::WatchError>(())
//! ```

pub mod cancel;
pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod ignore;
pub mod lab;
pub mod lifecycle;
pub mod scan;

pub use config::WatcherConfig;
pub use diff::diff;
pub use error::{Result, WatchError};
pub use event::{Event, FrontendEvent, Op};
pub use self::ignore::{IgnoreConfig, IgnorePolicy};
pub use lab::{LabPathSource, SharedLabPath};
pub use lifecycle::{WatchedRoot, Watcher, WatcherStats, MIN_INTERVAL};

pub use lab_core::{DataType, FileRecord, FileType, Snapshot};
