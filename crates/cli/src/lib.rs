//! Labwatch command-line support library
//!
//! Shared by the `labwatch` binary and its integration tests.

pub mod bridge;
pub mod config;
pub mod logging;
