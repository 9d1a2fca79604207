//! Event bridge: drains the watcher and prints what a UI would receive
//!
//! Events are projected relative to the lab root. A deleted root is the signal
//! for the UI to stop expecting live updates for it.

use anyhow::{Context, Result};
use crossbeam_channel::select;
use owo_colors::OwoColorize;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};
use watcher::{Event, FrontendEvent, LabPathSource, Op, WatchError, Watcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colored, one line per event
    Pretty,
    /// One JSON object per line (camelCase keys)
    Json,
}

/// What went over the bridge until the watcher closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeSummary {
    pub events: u64,
    pub errors: u64,
    pub root_deleted: bool,
}

/// Forward events and errors to `out` until the watcher's current run ends
///
/// Call before (or while) the watcher runs; `closed()` is captured on entry.
pub fn run<W: Write>(
    watcher: &Watcher,
    lab: &dyn LabPathSource,
    format: OutputFormat,
    out: &mut W,
) -> Result<BridgeSummary> {
    let events = watcher.events();
    let errors = watcher.errors();
    let closed = watcher.closed();
    let mut summary = BridgeSummary::default();

    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(event) => {
                    let root = lab.lab_path().unwrap_or_default();
                    write_event(out, &event.project(&root), &event, format)?;
                    summary.events += 1;
                }
                Err(_) => break,
            },
            recv(errors) -> msg => match msg {
                Ok(err) => {
                    summary.root_deleted |= err.is_root_deleted();
                    write_error(out, &err, format)?;
                    summary.errors += 1;
                }
                Err(_) => break,
            },
            recv(closed) -> _ => break,
        }
    }

    debug!(
        "Bridge done: {} events, {} errors",
        summary.events, summary.errors
    );
    Ok(summary)
}

fn write_event<W: Write>(out: &mut W, projected: &FrontendEvent, event: &Event, format: OutputFormat) -> Result<()> {
    let written = match format {
        OutputFormat::Json => {
            let line = serde_json::to_string(projected).context("Failed to serialize event")?;
            writeln!(out, "{}", line)
        }
        OutputFormat::Pretty => {
            let target = relative_target(projected);
            let op = format!("{:<6}", projected.op);
            let op = match projected.op {
                Op::Create => op.green().to_string(),
                Op::Remove => op.red().to_string(),
                Op::Rename | Op::Move => op.yellow().to_string(),
                _ => op.cyan().to_string(),
            };
            if projected.old_path.is_empty() {
                writeln!(out, "{} {} {}", op, target, kind(event).dimmed())
            } else {
                writeln!(
                    out,
                    "{} {} -> {} {}",
                    op,
                    projected.old_path,
                    target,
                    kind(event).dimmed()
                )
            }
        }
    };
    written.context("Failed to write event")
}

fn write_error<W: Write>(out: &mut W, err: &WatchError, format: OutputFormat) -> Result<()> {
    if err.is_root_deleted() {
        warn!("{}; stopped live updates", err);
    }

    let written = match format {
        OutputFormat::Json => {
            let line = json!({
                "error": err.to_string(),
                "path": err.path().map(|p| p.display().to_string()),
                "rootDeleted": err.is_root_deleted(),
            });
            writeln!(out, "{}", line)
        }
        OutputFormat::Pretty if err.is_root_deleted() => writeln!(
            out,
            "{} {}",
            "⚠".yellow(),
            format!("{}; stopped live updates", err).yellow()
        ),
        OutputFormat::Pretty => writeln!(out, "{} {}", "✗".red(), err),
    };
    written.context("Failed to write error")
}

/// `dir/file`, or just `file` for entries directly in the lab
fn relative_target(projected: &FrontendEvent) -> String {
    if projected.path == "." {
        projected.file.clone()
    } else {
        let mut target = PathBuf::from(&projected.path);
        target.push(&projected.file);
        target.to_string_lossy().replace('\\', "/")
    }
}

fn kind(event: &Event) -> String {
    format!("({}, {})", event.file_type, event.data_type)
}
