//! Blocking delay queue: a priority heap of *buckets*, gated so that only an
//! already-due item can be popped.
//!
//! Grounded on `queue/delay_queue.go`, with one deliberate improvement: the
//! Go source stores each item's *relative* delay as the heap priority at
//! `Offer` time, which can go stale. This implementation's items
//! (`Arc<TaskList>`) expose their
//! priority as the absolute expiration timestamp instead (see
//! `entry::TaskList`'s `HeapItem` impl), so ordering never goes stale
//! between offer and pop.

use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;

use crate::clock::now_ms;
use crate::context::Context;
use crate::heap::{HeapItem, IndexedHeap};

/// Something that knows how many milliseconds remain until it is due.
/// May be negative when overdue.
pub trait Delayed {
    fn delay_ms(&self, now_ms: i64) -> i64;
}

/// How long `pop` will wait when the queue is empty and the context has no
/// deadline, before re-checking for a freshly offered item. A pure safety
/// net: `offer` always signals `notify` too, so this path is only ever hit
/// if a signal was somehow missed.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Thread-safe wrapper around [`IndexedHeap`] that only yields items whose
/// delay has elapsed.
pub struct DelayQueue<T> {
    heap: Mutex<IndexedHeap<T>>,
    notify_tx: Sender<()>,
    notify_rx: Receiver<()>,
}

impl<T: HeapItem + Delayed + Clone> DelayQueue<T> {
    pub fn new() -> Self {
        let (notify_tx, notify_rx) = bounded(1);
        Self {
            heap: Mutex::new(IndexedHeap::new()),
            notify_tx,
            notify_rx,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Push `item`. If it becomes the new head, wake one waiter.
    pub fn offer(&self, item: T) {
        let marker = item.clone();
        let mut heap = self.heap.lock();
        heap.push(item);
        drop(heap);
        if marker.heap_index() == Some(0) {
            let _ = self.notify_tx.try_send(());
        }
    }

    /// Non-blocking: returns the head iff it is already due.
    pub fn poll(&self) -> Option<T> {
        let mut heap = self.heap.lock();
        match heap.peek() {
            Some(head) if head.delay_ms(now_ms()) <= 0 => heap.pop(),
            _ => None,
        }
    }

    /// Blocks until the head is due or `ctx` is cancelled/expires.
    ///
    /// At most one waiter is blocked inside this loop at a time per call;
    /// the signal on `notify` is edge-triggered ("a new item became head")
    /// and spurious wakeups are harmless because the head is re-peeked on
    /// every iteration.
    pub fn pop(&self, ctx: &Context) -> Option<T> {
        loop {
            if ctx.is_expired() {
                return None;
            }

            let wait_for = {
                let mut heap = self.heap.lock();
                match heap.peek() {
                    None => None,
                    Some(head) => {
                        let delay = head.delay_ms(now_ms());
                        if delay <= 0 {
                            return heap.pop();
                        }
                        Some(Duration::from_millis(delay as u64))
                    }
                }
            };

            let timeout = match (wait_for, ctx.remaining()) {
                (Some(w), Some(r)) => w.min(r),
                (Some(w), None) => w,
                (None, Some(r)) => r,
                (None, None) => IDLE_POLL,
            };

            select! {
                recv(self.notify_rx) -> _ => {}
                recv(ctx.done_receiver()) -> _ => return None,
                default(timeout) => {}
            }
        }
    }
}

impl<T: HeapItem + Delayed + Clone> Default for DelayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
