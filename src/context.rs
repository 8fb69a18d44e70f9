//! A minimal `context.Context`-style deadline/cancellation token.
//!
//! The driver loop (`SystemTimer::advance_clock`) blocks on the delay queue
//! bounded by one of these; a caller that wants to interrupt the wait calls
//! the paired [`CancelHandle`]. This mirrors the Go source's
//! `context.WithTimeout` usage in `cron.go`'s `run()` without pulling in a
//! general-purpose async context abstraction the engine doesn't otherwise
//! need.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

/// A deadline and/or cancellation signal passed into blocking waits.
pub struct Context {
    deadline: Option<Instant>,
    done_rx: Receiver<()>,
    _done_tx: Sender<()>,
}

impl Context {
    /// A context with no deadline and no cancellation; waits as long as the
    /// caller is willing to wait.
    pub fn background() -> Self {
        let (done_tx, done_rx) = bounded(1);
        Self {
            deadline: None,
            done_rx,
            _done_tx: done_tx,
        }
    }

    /// A context that is cancelled after `timeout` elapses, or earlier via
    /// the returned [`CancelHandle`].
    pub fn with_timeout(timeout: Duration) -> (Self, CancelHandle) {
        let (done_tx, done_rx) = bounded(1);
        let ctx = Self {
            deadline: Some(Instant::now() + timeout),
            done_rx,
            _done_tx: done_tx.clone(),
        };
        (ctx, CancelHandle(done_tx))
    }

    pub(crate) fn done_receiver(&self) -> &Receiver<()> {
        &self.done_rx
    }

    /// Time remaining until the deadline, or `None` if there is no deadline.
    /// A `Some(Duration::ZERO)` means the deadline has already passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has already elapsed.
    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(d) if d.is_zero())
    }
}

/// Handle used to cancel the [`Context`] it was issued alongside.
#[derive(Clone)]
pub struct CancelHandle(Sender<()>);

impl CancelHandle {
    /// Signal cancellation. Idempotent: cancelling twice is harmless.
    pub fn cancel(&self) {
        let _ = self.0.try_send(());
    }
}
