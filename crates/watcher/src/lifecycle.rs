//! Watcher lifecycle: root registry, poll loop and shutdown
//!
//! All mutable state (root registry, stored snapshot, running flag, policy)
//! lives in one `State` behind a single mutex. The lock is taken only for short
//! critical sections: the poll loop copies the roots out, walks the filesystem
//! unlocked, and re-locks to diff and publish the new snapshot.
//!
//! Events and errors travel on rendezvous channels. A send blocks until a
//! consumer receives it, so a slow consumer throttles the loop instead of
//! growing a queue.

use crate::cancel::{cancellation, CancelHandle, CancelToken};
use crate::config::WatcherConfig;
use crate::diff::{diff, DiffSummary};
use crate::error::{Result, WatchError};
use crate::event::{Event, Op};
use crate::ignore::{IgnoreConfig, IgnorePolicy};
use crate::lab::{configured, LabPathSource};
use crate::scan::scan_root;
use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender};
use lab_core::{FileRecord, Snapshot};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// Smallest interval accepted by `start`
pub const MIN_INTERVAL: Duration = Duration::from_nanos(1);

/// Lower bound on how often `start_lab` re-checks an unconfigured lab path
const LAB_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// A registered root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedRoot {
    /// Absolute path of the root
    pub path: PathBuf,
    /// Whether entries below direct children are listed
    pub recursive: bool,
}

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStats {
    /// Ticks whose events were all delivered
    pub ticks: u64,
    /// Events received by a consumer
    pub events_sent: u64,
    /// Errors received by a consumer
    pub errors_sent: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    events_sent: AtomicU64,
    errors_sent: AtomicU64,
}

struct State {
    running: bool,
    /// Root path -> recursive flag
    roots: BTreeMap<PathBuf, bool>,
    /// Snapshot stored by the previous tick
    files: Snapshot,
    policy: IgnorePolicy,
    /// Recompiled against the lab root once `start_lab` resolves it
    ignore_config: Option<IgnoreConfig>,
    /// Present while running; dropping it stops the loop
    cancel: Option<CancelHandle>,
    /// Dropped by the loop when it exits, disconnecting `closed_rx`
    closed_tx: Option<Sender<()>>,
    closed_rx: Receiver<()>,
}

/// One-shot gate that stays open once opened
#[derive(Default)]
struct Latch {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    fn open(&self) {
        let mut open = self.open.lock();
        if !*open {
            *open = true;
            self.cond.notify_all();
        }
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut open = self.open.lock();
        while !*open {
            if self.cond.wait_until(&mut open, deadline).timed_out() {
                return *open;
            }
        }
        true
    }
}

/// Polling file system watcher
///
/// Typical use from three contexts:
/// - a consumer drains `events()` / `errors()` until `closed()` disconnects
/// - a background thread calls `start` (blocks until `close`)
/// - the application registers roots and eventually calls `close`
pub struct Watcher {
    state: Mutex<State>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    errors_tx: Sender<WatchError>,
    errors_rx: Receiver<WatchError>,
    started: Latch,
    counters: Counters,
}

impl Watcher {
    /// Create a watcher with a policy that ignores nothing
    pub fn new() -> Self {
        Self::with_policy(IgnorePolicy::new())
    }

    pub fn with_policy(policy: IgnorePolicy) -> Self {
        let (events_tx, events_rx) = bounded(0);
        let (errors_tx, errors_rx) = bounded(0);
        let (closed_tx, closed_rx) = bounded(0);

        Self {
            state: Mutex::new(State {
                running: false,
                roots: BTreeMap::new(),
                files: Snapshot::new(),
                policy,
                ignore_config: None,
                cancel: None,
                closed_tx: Some(closed_tx),
                closed_rx,
            }),
            events_tx,
            events_rx,
            errors_tx,
            errors_rx,
            started: Latch::default(),
            counters: Counters::default(),
        }
    }

    /// Create a watcher whose policy is built from configuration
    pub fn from_config(lab_root: Option<&Path>, config: &WatcherConfig) -> Result<Self> {
        config.validate()?;
        let policy = IgnorePolicy::from_config(lab_root, &config.ignore)?;
        let watcher = Self::with_policy(policy);
        watcher.state.lock().ignore_config = Some(config.ignore.clone());
        Ok(watcher)
    }

    /// Receiving end of the event stream
    pub fn events(&self) -> Receiver<Event> {
        self.events_rx.clone()
    }

    /// Receiving end of the error stream
    pub fn errors(&self) -> Receiver<WatchError> {
        self.errors_rx.clone()
    }

    /// Disconnects when the poll loop run it belongs to has ended
    ///
    /// Never receives a value; use it in a `select!` arm. Before the first
    /// `start` it belongs to that first run. Between runs it returns the
    /// receiver of the run that ended, already disconnected; a new one is
    /// installed by the next `start`, so call again after restarting.
    pub fn closed(&self) -> Receiver<()> {
        self.state.lock().closed_rx.clone()
    }

    /// Register `path` and merge its listing into the stored snapshot
    ///
    /// Fails with `RootNotFound` if the path does not exist. Registering an
    /// existing root again refreshes its entries and recursive flag.
    pub fn add_root(&self, path: impl AsRef<Path>, recursive: bool) -> Result<()> {
        self.register_root(path.as_ref(), recursive, false).map(|_| ())
    }

    /// Scan and publish a root; returns `false` if it was not published
    ///
    /// With `while_running`, the root is dropped when the watcher stopped
    /// during the scan, so a concurrent `close` leaves the registry empty.
    fn register_root(&self, path: &Path, recursive: bool, while_running: bool) -> Result<bool> {
        let root = absolute(path)?;
        let policy = self.state.lock().policy.clone();

        let outcome = scan_root(&root, recursive, &policy)?;
        for err in &outcome.errors {
            warn!("Partial listing of {}: {}", root.display(), err);
        }

        let entries = outcome.snapshot.len();
        let mut state = self.state.lock();
        if while_running && !state.running {
            debug!("Watcher stopped while listing {}", root.display());
            return Ok(false);
        }
        state.files.merge(outcome.snapshot);
        state.roots.insert(root.clone(), recursive);
        drop(state);

        info!("Watching {} ({} entries, recursive: {})", root.display(), entries, recursive);
        Ok(true)
    }

    /// Deregister `path` and purge its entries from the stored snapshot
    ///
    /// Entries still covered by another registered root are kept. Removing a
    /// path that was never registered does nothing.
    pub fn remove_root(&self, path: impl AsRef<Path>) -> Result<()> {
        let root = absolute(path.as_ref())?;
        let mut state = self.state.lock();
        if !deregister(&mut state, &root) {
            debug!("remove_root: {} is not a watched root", root.display());
            return Ok(());
        }
        drop(state);

        info!("Stopped watching {}", root.display());
        Ok(())
    }

    /// Run the poll loop on the calling thread until `close` is called
    pub fn start(&self, interval: Duration) -> Result<()> {
        self.run(interval, None)
    }

    /// Like `start`, but first waits for `source` to yield a lab path
    ///
    /// The path is re-read on every retry until it is non-empty and registers
    /// successfully (recursively). `wait` is released only once the lab is
    /// registered. `close` aborts the wait.
    pub fn start_lab(&self, source: &dyn LabPathSource, interval: Duration) -> Result<()> {
        self.run(interval, Some(source))
    }

    fn run(&self, interval: Duration, lab: Option<&dyn LabPathSource>) -> Result<()> {
        if interval < MIN_INTERVAL {
            return Err(WatchError::DurationTooShort(interval));
        }

        let (token, closed_tx) = {
            let mut state = self.state.lock();
            if state.running {
                return Err(WatchError::AlreadyRunning);
            }
            state.running = true;

            let (handle, token) = cancellation();
            state.cancel = Some(handle);

            let closed_tx = match state.closed_tx.take() {
                Some(tx) => tx,
                None => {
                    let (tx, rx) = bounded(0);
                    state.closed_rx = rx;
                    tx
                }
            };
            (token, closed_tx)
        };
        // Dropped on every exit path, which signals `closed()`
        let _closed = closed_tx;

        if let Some(source) = lab {
            if !self.register_lab(source, interval, &token) {
                info!("Watcher closed before the lab was registered");
                return Ok(());
            }
        }

        self.started.open();
        info!("Watcher started (interval: {:?})", interval);

        while self.tick(&token) && token.sleep(interval) {}

        info!("Watcher stopped");
        Ok(())
    }

    fn register_lab(&self, source: &dyn LabPathSource, interval: Duration, token: &CancelToken) -> bool {
        let retry = interval.max(LAB_RETRY_INTERVAL);
        let mut waiting_logged = false;

        loop {
            if token.is_cancelled() {
                return false;
            }

            match configured(source.lab_path()) {
                Some(lab) => {
                    self.compile_lab_policy(&lab);
                    match self.register_root(&lab, true, true) {
                        Ok(registered) => return registered && !token.is_cancelled(),
                        Err(err) => warn!("Cannot register lab {}: {}", lab.display(), err),
                    }
                }
                None if !waiting_logged => {
                    info!("Waiting for the lab path to be configured");
                    waiting_logged = true;
                }
                None => {}
            }

            if !token.sleep(retry) {
                return false;
            }
        }
    }

    /// Rebuild the pattern part of the policy now that the lab root is known
    ///
    /// Anchored patterns and `<lab>/.labignore` need the root. Runtime
    /// additions to the ignore set and the hidden flag are carried over.
    fn compile_lab_policy(&self, lab: &Path) {
        let mut state = self.state.lock();
        let Some(config) = state.ignore_config.clone() else {
            return;
        };

        match IgnorePolicy::from_config(Some(lab), &config) {
            Ok(mut policy) => {
                policy.set_ignore_hidden(state.policy.ignores_hidden());
                for path in state.policy.ignored_paths() {
                    policy.ignore_path(path.clone());
                }
                state.policy = policy;
                debug!("Ignore policy compiled for lab {}", lab.display());
            }
            Err(err) => warn!("Keeping previous ignore policy for {}: {}", lab.display(), err),
        }
    }

    /// One poll: snapshot, diff, publish, emit
    ///
    /// Returns `false` once cancellation has been observed.
    fn tick(&self, token: &CancelToken) -> bool {
        let (roots, policy) = {
            let state = self.state.lock();
            if !state.running {
                return false;
            }
            (state.roots.clone(), state.policy.clone())
        };

        let mut current = Snapshot::new();
        for (root, recursive) in &roots {
            if token.is_cancelled() {
                return false;
            }

            match scan_root(root, *recursive, &policy) {
                Ok(outcome) => {
                    current.merge(outcome.snapshot);
                    for err in outcome.errors {
                        warn!("{}", err);
                        if !self.report(err, token) {
                            return false;
                        }
                    }
                }
                Err(WatchError::RootNotFound(path)) => {
                    warn!("Watched root deleted: {}", path.display());
                    if !self.report(WatchError::RootDeleted(path.clone()), token) {
                        return false;
                    }
                    let mut state = self.state.lock();
                    deregister(&mut state, &path);
                }
                Err(err) => {
                    warn!("{}", err);
                    if !self.report(err, token) {
                        return false;
                    }
                }
            }
        }

        let events = {
            let mut state = self.state.lock();
            if !state.running {
                return false;
            }

            // Roots removed while we were walking must not come back
            current.retain_under(state.roots.keys().map(PathBuf::as_path));
            for ignored in state.policy.ignored_paths() {
                current.purge_under(ignored);
            }

            // Roots added while we were walking keep what add_root listed
            let added: Vec<PathBuf> = state
                .roots
                .keys()
                .filter(|root| !roots.contains_key(*root))
                .cloned()
                .collect();
            for root in &added {
                current.merge(state.files.subtree(root));
            }

            let events = diff(&state.files, &current);
            state.files = current;
            events
        };

        let summary = DiffSummary::of(&events);
        if !summary.is_empty() {
            debug!(
                "Tick: {} created, {} removed, {} renamed",
                summary.created, summary.removed, summary.renamed
            );
        }

        for event in events {
            if !self.send_event(event, token) {
                return false;
            }
        }

        self.counters.ticks.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Blocking send that gives up as soon as the token is cancelled
    fn send_event(&self, event: Event, token: &CancelToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        select! {
            recv(token.receiver()) -> _ => false,
            send(self.events_tx, event) -> res => {
                if res.is_ok() {
                    self.counters.events_sent.fetch_add(1, Ordering::Relaxed);
                }
                res.is_ok()
            }
        }
    }

    fn report(&self, err: WatchError, token: &CancelToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        select! {
            recv(token.receiver()) -> _ => false,
            send(self.errors_tx, err) -> res => {
                if res.is_ok() {
                    self.counters.errors_sent.fetch_add(1, Ordering::Relaxed);
                }
                res.is_ok()
            }
        }
    }

    /// Stop the poll loop and forget all roots and stored entries
    ///
    /// Does nothing when not running. Returns without waiting; use
    /// `wait_closed` or `closed()` to know when the loop has exited.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }

        state.running = false;
        state.files.clear();
        state.roots.clear();
        if let Some(mut handle) = state.cancel.take() {
            handle.cancel();
        }
        drop(state);

        info!("Watcher closing");
    }

    /// Block until the first successful `start` is running
    pub fn wait(&self) {
        self.started.wait();
    }

    /// Like `wait`, giving up after `timeout`; returns whether it started
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.started.wait_timeout(timeout)
    }

    /// Block until the current run of the poll loop has exited
    pub fn wait_closed(&self) {
        let _ = self.closed().recv();
    }

    /// Like `wait_closed`, giving up after `timeout`; returns whether it exited
    pub fn wait_closed_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.closed().recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// Push a synthetic event to consumers, e.g. to force a UI refresh
    ///
    /// Waits for the loop to be live first. The event path is `-`; without a
    /// record a placeholder named `triggered event` is used. Returns `false`
    /// if the loop exited before a consumer took the event.
    pub fn trigger_event(&self, op: Op, record: Option<FileRecord>) -> bool {
        self.wait();

        let record = record.unwrap_or_else(|| FileRecord {
            name: "triggered event".to_string(),
            path: PathBuf::from("-"),
            size: 0,
            mode: 0,
            is_dir: false,
            mod_time: SystemTime::now(),
        });
        let event = Event::new(op, PathBuf::from("-"), record);
        let closed = self.closed();

        select! {
            send(self.events_tx, event) -> res => res.is_ok(),
            recv(closed) -> _ => false,
        }
    }

    /// Replace the ignore policy; applies from the next tick
    pub fn set_policy(&self, policy: IgnorePolicy) {
        self.state.lock().policy = policy;
    }

    /// Exclude a path (and its subtree) from future snapshots
    ///
    /// Stored entries under it are dropped silently: no `Remove` events.
    pub fn ignore_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = absolute(path.as_ref())?;
        let mut state = self.state.lock();
        let purged = state.files.purge_under(&path);
        state.policy.ignore_path(path);
        drop(state);

        debug!("ignore_path: dropped {} stored entries", purged);
        Ok(())
    }

    pub fn set_ignore_hidden(&self, ignore_hidden: bool) {
        self.state.lock().policy.set_ignore_hidden(ignore_hidden);
    }

    pub fn policy(&self) -> IgnorePolicy {
        self.state.lock().policy.clone()
    }

    /// Registered roots in path order
    pub fn roots(&self) -> Vec<WatchedRoot> {
        self.state
            .lock()
            .roots
            .iter()
            .map(|(path, recursive)| WatchedRoot {
                path: path.clone(),
                recursive: *recursive,
            })
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Number of entries in the stored snapshot
    pub fn snapshot_len(&self) -> usize {
        self.state.lock().files.len()
    }

    pub fn stats(&self) -> WatcherStats {
        WatcherStats {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            events_sent: self.counters.events_sent.load(Ordering::Relaxed),
            errors_sent: self.counters.errors_sent.load(Ordering::Relaxed),
        }
    }
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove `root` from the registry and purge the entries only it covered
fn deregister(state: &mut State, root: &Path) -> bool {
    if state.roots.remove(root).is_none() {
        return false;
    }

    let others: Vec<PathBuf> = state.roots.keys().cloned().collect();
    let covered = state.files.subtree(root);
    state.files.purge_under(root);
    for (path, record) in covered {
        if others.iter().any(|other| path.starts_with(other)) {
            state.files.insert(record);
        }
    }
    true
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| WatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_close_without_start_is_noop() {
        let watcher = Watcher::new();
        watcher.close();
        watcher.close();
        assert!(!watcher.is_running());
    }

    #[test]
    fn test_duration_too_short() {
        let watcher = Watcher::new();
        let err = watcher.start(Duration::ZERO).unwrap_err();
        assert!(matches!(err, WatchError::DurationTooShort(_)));
        assert!(!watcher.is_running());
    }

    #[test]
    fn test_add_root_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = Watcher::new();

        let err = watcher.add_root(temp_dir.path().join("nope"), true).unwrap_err();

        assert!(matches!(err, WatchError::RootNotFound(_)));
        assert!(watcher.roots().is_empty());
    }

    #[test]
    fn test_add_and_remove_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("graphs")).unwrap();
        fs::write(temp_dir.path().join("graphs/a.json"), b"{}").unwrap();

        let watcher = Watcher::new();
        watcher.add_root(temp_dir.path(), true).unwrap();

        assert_eq!(watcher.snapshot_len(), 3);
        assert_eq!(
            watcher.roots(),
            vec![WatchedRoot {
                path: temp_dir.path().to_path_buf(),
                recursive: true
            }]
        );

        watcher.remove_root(temp_dir.path()).unwrap();
        assert!(watcher.roots().is_empty());
        assert_eq!(watcher.snapshot_len(), 0);

        // Unknown roots are ignored
        watcher.remove_root(temp_dir.path()).unwrap();
    }

    #[test]
    fn test_remove_nested_root_keeps_outer_entries() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("a.json"), b"{}").unwrap();

        let watcher = Watcher::new();
        watcher.add_root(temp_dir.path(), true).unwrap();
        watcher.add_root(&sub, true).unwrap();
        assert_eq!(watcher.snapshot_len(), 3);

        watcher.remove_root(&sub).unwrap();

        assert_eq!(watcher.roots().len(), 1);
        assert_eq!(watcher.snapshot_len(), 3);
    }

    #[test]
    fn test_already_running() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = Arc::new(Watcher::new());
        watcher.add_root(temp_dir.path(), true).unwrap();

        let runner = {
            let watcher = Arc::clone(&watcher);
            thread::spawn(move || watcher.start(Duration::from_millis(10)))
        };
        assert!(watcher.wait_timeout(Duration::from_secs(5)));

        let err = watcher.start(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, WatchError::AlreadyRunning));

        watcher.close();
        assert!(watcher.wait_closed_timeout(Duration::from_secs(5)));
        runner.join().unwrap().unwrap();

        assert!(!watcher.is_running());
        assert!(watcher.roots().is_empty());
        assert_eq!(watcher.snapshot_len(), 0);
    }

    #[test]
    fn test_register_while_stopped_is_not_published() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = Watcher::new();

        let registered = watcher.register_root(temp_dir.path(), true, true).unwrap();

        assert!(!registered);
        assert!(watcher.roots().is_empty());
        assert_eq!(watcher.snapshot_len(), 0);
    }

    #[test]
    fn test_closed_receiver_per_run() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = Arc::new(Watcher::new());
        let first = watcher.closed();

        let runner = {
            let watcher = Arc::clone(&watcher);
            thread::spawn(move || watcher.start(Duration::from_millis(10)))
        };
        assert!(watcher.wait_timeout(Duration::from_secs(5)));
        watcher.close();
        runner.join().unwrap().unwrap();

        // Between runs the ended run's receiver is handed out
        assert_eq!(first.recv_timeout(Duration::from_secs(5)), Err(RecvTimeoutError::Disconnected));
        assert!(watcher.wait_closed_timeout(Duration::from_millis(10)));

        watcher.add_root(temp_dir.path(), true).unwrap();
        let runner = {
            let watcher = Arc::clone(&watcher);
            thread::spawn(move || watcher.start(Duration::from_millis(10)))
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        while !watcher.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        // The restarted run installed a fresh, live receiver
        let second = watcher.closed();
        assert_eq!(second.recv_timeout(Duration::from_millis(50)), Err(RecvTimeoutError::Timeout));

        watcher.close();
        assert_eq!(second.recv_timeout(Duration::from_secs(5)), Err(RecvTimeoutError::Disconnected));
        runner.join().unwrap().unwrap();
    }

    #[test]
    fn test_lab_policy_compiled_on_registration() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(crate::ignore::LABIGNORE_FILE), "*.log\n").unwrap();

        let watcher = Watcher::from_config(None, &WatcherConfig::default()).unwrap();
        watcher.set_ignore_hidden(false);
        watcher.ignore_path(temp_dir.path().join("drafts")).unwrap();

        watcher.compile_lab_policy(temp_dir.path());

        let policy = watcher.policy();
        assert!(policy.should_ignore_entry(&temp_dir.path().join("debug.log"), false));
        assert!(policy.should_ignore_entry(&temp_dir.path().join("drafts"), true));
        assert!(!policy.ignores_hidden());
        assert!(!policy.should_ignore_entry(&temp_dir.path().join("graph.json"), false));
    }

    #[test]
    fn test_latch_timeout() {
        let watcher = Watcher::new();
        assert!(!watcher.wait_timeout(Duration::from_millis(20)));
    }
}
