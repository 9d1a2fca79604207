//! Cancellation token for the poll loop
//!
//! A token is a receiver on a channel nobody ever sends on. Cancelling drops
//! the sending half, which disconnects the channel: every pending or future
//! `select!` on the token then fires immediately, so one cancellation wakes
//! sleeps and blocked sends alike.

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use std::time::Duration;

/// Creates a linked handle/token pair
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = bounded(0);
    (CancelHandle { tx: Some(tx) }, CancelToken { rx })
}

/// Owning side; cancels when `cancel` is called or when dropped
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<Sender<()>>,
}

impl CancelHandle {
    pub fn cancel(&mut self) {
        self.tx.take();
    }
}

/// Observing side, checked before every blocking operation of the loop
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Channel to use in a `select!` arm; it fires once cancelled
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    /// Sleep for `duration` unless cancelled first
    ///
    /// Returns `false` when the sleep was cut short by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        select! {
            recv(self.rx) -> _ => false,
            default(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_cancel_is_observed_by_clones() {
        let (mut handle, token) = cancellation();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        handle.cancel();

        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_drop_cancels() {
        let (handle, token) = cancellation();
        drop(handle);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_sleep_interrupted() {
        let (mut handle, token) = cancellation();
        let sleeper = thread::spawn(move || {
            let started = Instant::now();
            let completed = token.sleep(Duration::from_secs(30));
            (completed, started.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        handle.cancel();

        let (completed, elapsed) = sleeper.join().unwrap();
        assert!(!completed);
        assert!(elapsed < Duration::from_secs(10));
    }

    #[test]
    fn test_sleep_completes() {
        let (_handle, token) = cancellation();
        assert!(token.sleep(Duration::from_millis(5)));
    }
}
