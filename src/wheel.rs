//! Single-level timing wheel and its recursive overflow composition.
//!
//! Grounded on `timer/timing_wheel.go`, with the bucket-alignment formula
//! resolved so that the aligned expiration offered to the delay queue is
//! `virtual_id * tick`, the absolute time the `virtual_id` already encodes,
//! not `current_time + virtual_id * tick` which would double-count the
//! cycle offset.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::delay_queue::DelayQueue;
use crate::entry::{TaskEntry, TaskList};

/// One level of the hierarchical wheel.
///
/// `current_time` is always aligned to `tick`: writes go only through
/// [`Level::advance_clock`], which masks off the remainder.
pub struct Level {
    tick_ms: i64,
    wheel_size: i64,
    interval_ms: i64,
    current_time_ms: AtomicI64,
    buckets: Vec<Arc<TaskList>>,
    overflow: Mutex<Option<Arc<Level>>>,
    counter: Arc<AtomicI64>,
    delay_queue: Arc<DelayQueue<Arc<TaskList>>>,
}

impl Level {
    pub fn new(
        tick_ms: i64,
        wheel_size: i64,
        start_ms: i64,
        counter: Arc<AtomicI64>,
        delay_queue: Arc<DelayQueue<Arc<TaskList>>>,
    ) -> Arc<Self> {
        assert!(tick_ms > 0, "tick_ms must be positive");
        assert!(wheel_size > 0, "wheel_size must be positive");
        let buckets = (0..wheel_size)
            .map(|_| Arc::new(TaskList::new(counter.clone())))
            .collect();
        Arc::new(Self {
            tick_ms,
            wheel_size,
            interval_ms: tick_ms * wheel_size,
            current_time_ms: AtomicI64::new(start_ms - (start_ms.rem_euclid(tick_ms))),
            buckets,
            overflow: Mutex::new(None),
            counter,
            delay_queue,
        })
    }

    pub fn tick_ms(&self) -> i64 {
        self.tick_ms
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    pub fn current_time_ms(&self) -> i64 {
        self.current_time_ms.load(Ordering::Acquire)
    }

    /// Attempt to place `entry` at this level or delegate to the overflow
    /// level. Returns `false` when the entry is already overdue or
    /// cancelled — the caller (driver) must then run or discard it.
    pub fn add(self: &Arc<Self>, entry: Arc<TaskEntry>) -> bool {
        if entry.cancelled() {
            return false;
        }

        let current = self.current_time_ms();
        let exp = entry.expiration_ms();

        if exp < current + self.tick_ms {
            return false;
        }

        if exp < current + self.interval_ms {
            let virtual_id = exp / self.tick_ms;
            let slot = (virtual_id.rem_euclid(self.wheel_size)) as usize;
            let bucket = &self.buckets[slot];
            bucket.add(entry);
            let aligned = virtual_id * self.tick_ms;
            if bucket.set_expiration(aligned) {
                self.delay_queue.offer(bucket.clone());
            }
            return true;
        }

        self.ensure_overflow().add(entry)
    }

    /// Advance this level's clock to the tick boundary at or before
    /// `time_ms`, and recurse into the overflow level if present.
    pub fn advance_clock(&self, time_ms: i64) {
        let current = self.current_time_ms();
        if time_ms >= current + self.tick_ms {
            let aligned = time_ms - time_ms.rem_euclid(self.tick_ms);
            self.current_time_ms.store(aligned, Ordering::Release);
            if let Some(overflow) = self.overflow.lock().as_ref() {
                overflow.advance_clock(aligned);
            }
        }
    }

    /// Lazily create the overflow level, idempotent under concurrent callers.
    fn ensure_overflow(self: &Arc<Self>) -> Arc<Level> {
        let mut guard = self.overflow.lock();
        if let Some(existing) = guard.as_ref() {
            return existing.clone();
        }
        debug!(
            tick_ms = self.interval_ms,
            "allocating overflow wheel level"
        );
        let level = Level::new(
            self.interval_ms,
            self.wheel_size,
            self.current_time_ms(),
            self.counter.clone(),
            self.delay_queue.clone(),
        );
        *guard = Some(level.clone());
        level
    }
}
