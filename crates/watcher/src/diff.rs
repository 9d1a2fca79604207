//! Snapshot diff: created, removed and renamed entries between two ticks

use crate::event::Event;
use lab_core::{FileRecord, Snapshot};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Compare two snapshots and derive the events that explain the change
///
/// Paths only in `previous` are removal candidates, paths only in `current`
/// are creation candidates. A removal and a creation are paired into a
/// `Rename` when the records look like the same file (`FileRecord::same_file`)
/// and both paths share a parent directory. Unpaired candidates become
/// `Create` and `Remove` events.
///
/// The pairing compares metadata, not content: deleting one file and creating
/// an unrelated one of the same size and mode in the same directory within a
/// single tick reports a rename. Moves across directories are reported as a
/// remove plus a create.
///
/// Output order: renames, then creates, then removes. Candidates are visited in
/// path order so the result is deterministic for a given pair of snapshots.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<Event> {
    let mut removed: BTreeMap<&PathBuf, &FileRecord> = previous
        .iter()
        .filter(|(path, _)| !current.contains(path))
        .collect();
    let mut created: BTreeMap<&PathBuf, &FileRecord> = current
        .iter()
        .filter(|(path, _)| !previous.contains(path))
        .collect();

    let mut events = Vec::with_capacity(removed.len() + created.len());

    // Pairing pass
    let mut paired: Vec<&PathBuf> = Vec::new();
    for (old_path, old_record) in removed.iter() {
        let matching = created.iter().find(|(new_path, new_record)| {
            old_record.same_file(new_record) && old_path.parent() == new_path.parent()
        });

        if let Some((new_path, new_record)) = matching {
            let new_path = *new_path;
            events.push(Event::rename((*old_path).clone(), (*new_record).clone()));
            paired.push(*old_path);
            created.remove(new_path);
        }
    }
    for old_path in paired {
        removed.remove(old_path);
    }

    events.extend(created.into_values().map(|record| Event::create(record.clone())));
    events.extend(removed.into_values().map(|record| Event::remove(record.clone())));

    events
}

/// Per-kind tally of a diff, used for tick logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub created: usize,
    pub removed: usize,
    pub renamed: usize,
}

impl DiffSummary {
    pub fn of(events: &[Event]) -> Self {
        use crate::event::Op;

        let mut summary = Self::default();
        for event in events {
            match event.op {
                Op::Create => summary.created += 1,
                Op::Remove => summary.removed += 1,
                Op::Rename => summary.renamed += 1,
                Op::Write | Op::Chmod | Op::Move => {}
            }
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.removed == 0 && self.renamed == 0
    }
}
