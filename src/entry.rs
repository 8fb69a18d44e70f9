//! Task entries and the intrusive bucket list that holds them.
//!
//! Grounded on `timer/task_list.go`'s `Task`/`TaskEntry`/`TaskList` trio, but
//! the raw `next`/`prev` pointer list is replaced with a `slab`-backed index
//! list: each [`TaskList`] owns a `Slab<Node>` plus head/tail keys, and each
//! [`TaskEntry`] remembers `(bucket, slab key)` so removing itself from
//! wherever it lives is still O(1) without unsafe pointer juggling. This is
//! the same indices-instead-of-pointers trick `tokio`/`mio` use internally
//! for intrusive lists in safe Rust.

use std::sync::atomic::{AtomicI64, AtomicIsize, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use slab::Slab;

use crate::task::Task;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

fn next_entry_id() -> u64 {
    NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed)
}

/// A single scheduled firing of a [`Task`].
///
/// `exp` is fixed at construction: a rescheduled task receives a brand new
/// entry rather than having this one mutated in place. Cancellation is
/// detected structurally: the entry is live iff
/// `task.entry()` still points back at it (by `Arc` identity), matching the
/// Go source's `t.task.taskEntry != t` check in `cancelled()`.
pub struct TaskEntry {
    id: u64,
    exp_ms: i64,
    task: Arc<dyn Task>,
    link: Mutex<Option<BucketLink>>,
}

struct BucketLink {
    bucket: std::sync::Weak<TaskList>,
    key: usize,
}

impl TaskEntry {
    /// Create a new entry for `task` expiring at `exp_ms`, and make it the
    /// task's current entry (invalidating whatever entry the task held
    /// before, per the data-model invariant that a task owns at most one
    /// live entry at a time).
    pub fn new(task: Arc<dyn Task>, exp_ms: i64) -> Arc<Self> {
        let entry = Arc::new(Self {
            id: next_entry_id(),
            exp_ms,
            task: task.clone(),
            link: Mutex::new(None),
        });
        task.set_entry(Some(entry.clone()));
        entry
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn expiration_ms(&self) -> i64 {
        self.exp_ms
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// Whether this entry has been superseded or explicitly cancelled.
    pub fn cancelled(self: &Arc<Self>) -> bool {
        match self.task.entry() {
            Some(current) => !Arc::ptr_eq(&current, self),
            None => true,
        }
    }

    /// Detach from whichever bucket currently holds this entry, if any.
    /// Idempotent and safe to call concurrently with that bucket's `flush`.
    pub fn remove(self: &Arc<Self>) {
        let link = self.link.lock().take();
        if let Some(link) = link {
            if let Some(bucket) = link.bucket.upgrade() {
                bucket.remove_key(link.key);
            }
        }
    }

    fn attach(self: &Arc<Self>, bucket: &Arc<TaskList>, key: usize) {
        *self.link.lock() = Some(BucketLink {
            bucket: Arc::downgrade(bucket),
            key,
        });
    }

    fn detach_silently(self: &Arc<Self>) {
        *self.link.lock() = None;
    }
}

struct Node {
    entry: Arc<TaskEntry>,
    prev: Option<usize>,
    next: Option<usize>,
}

struct ListInner {
    slab: Slab<Node>,
    head: Option<usize>,
    tail: Option<usize>,
}

/// A bucket: one slot of one timing-wheel level.
///
/// `expiration` tracks the earliest firing time of anything currently
/// linked, or `i64::MAX` when empty (reset by [`TaskList::flush`]). Its
/// value also doubles as this bucket's priority in the delay queue's heap —
/// see the [`crate::heap::HeapItem`] impl below.
pub struct TaskList {
    inner: Mutex<ListInner>,
    expiration_ms: AtomicI64,
    heap_index: AtomicIsize,
    counter: Arc<AtomicI64>,
}

const NOT_IN_HEAP: isize = -1;
pub(crate) const NO_EXPIRATION: i64 = i64::MAX;

impl TaskList {
    pub fn new(counter: Arc<AtomicI64>) -> Self {
        Self {
            inner: Mutex::new(ListInner {
                slab: Slab::new(),
                head: None,
                tail: None,
            }),
            expiration_ms: AtomicI64::new(NO_EXPIRATION),
            heap_index: AtomicIsize::new(NOT_IN_HEAP),
            counter,
        }
    }

    /// Link `entry` at the tail of this bucket, first detaching it from
    /// wherever it used to live.
    pub fn add(self: &Arc<Self>, entry: Arc<TaskEntry>) {
        entry.remove();
        let mut inner = self.inner.lock();
        let key = inner.slab.insert(Node {
            entry: entry.clone(),
            prev: inner.tail,
            next: None,
        });
        match inner.tail {
            Some(tail) => inner.slab[tail].next = Some(key),
            None => inner.head = Some(key),
        }
        inner.tail = Some(key);
        drop(inner);
        entry.attach(self, key);
        self.counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Unlink the entry at `key`, if it is still here. Safe to race with
    /// `flush`: both paths check membership before mutating.
    fn remove_key(&self, key: usize) {
        let mut inner = self.inner.lock();
        if !inner.slab.contains(key) {
            return;
        }
        let node = inner.slab.remove(key);
        match node.prev {
            Some(prev) => inner.slab[prev].next = node.next,
            None => inner.head = node.next,
        }
        match node.next {
            Some(next) => inner.slab[next].prev = node.prev,
            None => inner.tail = node.prev,
        }
        drop(inner);
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }

    /// Atomically set the bucket's tracked expiration, returning whether it
    /// changed. The wheel uses this to offer a bucket to the delay queue at
    /// most once per cycle: repeated entries landing in the same bucket
    /// during the same cycle see no change and skip the redundant offer.
    pub fn set_expiration(&self, new_exp_ms: i64) -> bool {
        self.expiration_ms.swap(new_exp_ms, Ordering::AcqRel) != new_exp_ms
    }

    pub fn expiration_ms(&self) -> i64 {
        self.expiration_ms.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.head.is_none()
    }

    /// Unlink every entry from head to tail, invoking `f` on each, then
    /// reset `expiration` to "empty". Entries are detached one at a time so
    /// a concurrent [`TaskEntry::remove`] (cancellation) racing this call
    /// only ever sees a consistent list.
    pub fn flush(self: &Arc<Self>, mut f: impl FnMut(Arc<TaskEntry>)) {
        loop {
            let next_entry = {
                let mut inner = self.inner.lock();
                let head_key = match inner.head {
                    Some(k) => k,
                    None => break,
                };
                let node = inner.slab.remove(head_key);
                inner.head = node.next;
                match inner.head {
                    Some(new_head) => inner.slab[new_head].prev = None,
                    None => inner.tail = None,
                }
                node.entry
            };
            self.counter.fetch_sub(1, Ordering::Relaxed);
            next_entry.detach_silently();
            f(next_entry);
        }
        self.expiration_ms.store(NO_EXPIRATION, Ordering::Release);
    }
}

impl crate::heap::HeapItem for Arc<TaskList> {
    fn priority(&self) -> i64 {
        self.expiration_ms()
    }

    fn heap_index(&self) -> Option<usize> {
        let idx = self.heap_index.load(Ordering::Acquire);
        if idx < 0 {
            None
        } else {
            Some(idx as usize)
        }
    }

    fn set_heap_index(&self, idx: Option<usize>) {
        self.heap_index.store(
            idx.map(|i| i as isize).unwrap_or(NOT_IN_HEAP),
            Ordering::Release,
        );
    }
}

impl crate::delay_queue::Delayed for Arc<TaskList> {
    fn delay_ms(&self, now_ms: i64) -> i64 {
        self.expiration_ms() - now_ms
    }
}
