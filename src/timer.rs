//! The driver: owns the root wheel, the shared counter, and the delay
//! queue, and exposes the engine's public surface.
//!
//! Grounded on `timer/timer.go`'s `Timer` struct, with an advance-lock/driver
//! shape (write-locked clock mutation, read-locked inserts) matching this
//! crate's general `parking_lot` locking convention.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::clock::now_ms;
use crate::context::Context;
use crate::delay_queue::DelayQueue;
use crate::entry::TaskEntry;
use crate::executor::{default_executor, Executor};
use crate::task::Task;
use crate::wheel::Level;

/// The scheduler engine: accepts tasks, and is driven forward by repeated
/// calls to [`SystemTimer::advance_clock`] from a caller-owned loop.
pub struct SystemTimer {
    root: Arc<Level>,
    counter: Arc<AtomicI64>,
    delay_queue: Arc<DelayQueue<Arc<crate::entry::TaskList>>>,
    /// Serializes `advance_clock` against itself and against wheel
    /// `current_time` mutation. `add` takes this in shared mode: insertion
    /// only mutates bucket state, which is protected by the bucket's own
    /// lock, so many inserters can proceed while one thread drives the
    /// clock.
    advance_lock: RwLock<()>,
    stopped: AtomicBool,
    executor: Arc<dyn Executor>,
}

impl SystemTimer {
    pub fn new(tick_ms: i64, wheel_size: i64) -> Arc<Self> {
        Self::with_executor(tick_ms, wheel_size, default_executor())
    }

    pub fn with_executor(tick_ms: i64, wheel_size: i64, executor: Arc<dyn Executor>) -> Arc<Self> {
        let counter = Arc::new(AtomicI64::new(0));
        let delay_queue = Arc::new(DelayQueue::new());
        let root = Level::new(tick_ms, wheel_size, now_ms(), counter.clone(), delay_queue.clone());
        Arc::new(Self {
            root,
            counter,
            delay_queue,
            advance_lock: RwLock::new(()),
            stopped: AtomicBool::new(false),
            executor,
        })
    }

    /// Schedule `task`, firing `task.delay_ms()` milliseconds from now.
    /// A no-op once [`SystemTimer::shutdown`] has been called.
    pub fn add(self: &Arc<Self>, task: Arc<dyn Task>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let exp = now_ms() + task.delay_ms();
        let entry = TaskEntry::new(task, exp);
        let _guard = self.advance_lock.read();
        self.add_internal(entry);
    }

    /// Place `entry` into the wheel, or spawn it immediately if the wheel
    /// declines it. Callers must already hold `advance_lock` (either side) —
    /// this is never taken here so it can be called from inside the flush
    /// loop of `advance_clock`, which holds the write half.
    fn add_internal(self: &Arc<Self>, entry: Arc<TaskEntry>) {
        if !self.root.add(entry.clone()) && !entry.cancelled() {
            let task = entry.task().clone();
            self.executor.spawn(Box::new(move || task.run()));
        }
    }

    /// Block on the delay queue (bounded by `ctx`) for the next due bucket,
    /// then advance the wheel and flush everything that is now due.
    /// Returns `false` if the context expired/was cancelled, or the driver
    /// has been shut down, with no work performed.
    pub fn advance_clock(self: &Arc<Self>, ctx: &Context) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }

        let Some(bucket) = self.delay_queue.pop(ctx) else {
            return false;
        };

        let _guard = self.advance_lock.write();
        let mut current = Some(bucket);
        while let Some(bucket) = current {
            self.root.advance_clock(bucket.expiration_ms());
            let timer = self.clone();
            bucket.flush(|entry| timer.add_internal(entry));
            current = self.delay_queue.poll();
        }
        trace!(size = self.size(), "advance_clock drained ready buckets");
        true
    }

    /// Count of live (unfired, uncancelled) entries across every level.
    pub fn size(&self) -> i64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Stop accepting new tasks; subsequent `advance_clock` calls return
    /// `false` immediately. Already-running task bodies are unaffected;
    /// unfired entries are simply abandoned.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}
