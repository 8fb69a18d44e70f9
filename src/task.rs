//! The `Task` capability set and the built-in one-shot implementation.
//!
//! Grounded on `timer/task_list.go`'s `Task` struct (`delayMs`, `taskEntry`,
//! `run`) generalized into a trait so the cron front-end's `Entry` (see
//! `cron::cron::Entry`) can implement the same capability set and re-arm
//! itself through the identical `SystemTimer::add` path a one-shot task
//! uses. A tagged enum was considered (per the design notes' redesign flag)
//! but rejected: `Entry` needs cron-specific state (`Schedule`, the wrapped
//! job) that would have to live inside every enum variant's match arms
//! anyway, so a trait object is the better fit here.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::entry::TaskEntry;

/// Anything the engine can schedule, run, and cancel.
///
/// `run` takes `self: Arc<Self>` (a stable, `dyn`-compatible receiver for
/// `Box`/`Rc`/`Arc`) rather than `&self` so that implementors which need to
/// re-arm themselves — the cron `Entry` being the motivating case — can
/// clone their own `Arc` and hand it back to `SystemTimer::add` without an
/// awkward self-referential weak pointer dance in every implementor.
pub trait Task: Send + Sync {
    /// Stable identifier, for logging and snapshotting only; the engine
    /// does not use it for ordering or lookup.
    fn id(&self) -> u64;

    /// Milliseconds from "now" until this task should first fire.
    fn delay_ms(&self) -> i64;

    /// Run the task body. Invoked on a background executor, never on the
    /// driver thread.
    fn run(self: Arc<Self>);

    /// Cancel the task's current entry, if any. Idempotent.
    fn cancel(&self);

    /// The task's current entry, or `None` if cancelled / never scheduled.
    fn entry(&self) -> Option<Arc<TaskEntry>>;

    /// Replace the task's current entry. Implementors must remove the
    /// previous entry (if any and different) so a task never owns more
    /// than one live entry at a time.
    fn set_entry(&self, entry: Option<Arc<TaskEntry>>);
}

/// Shared bookkeeping for the "current entry" invariant, reusable by any
/// `Task` implementor (built-in or user-defined).
#[derive(Default)]
pub struct TaskState {
    current: Mutex<Option<Arc<TaskEntry>>>,
}

impl TaskState {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    pub fn entry(&self) -> Option<Arc<TaskEntry>> {
        self.current.lock().clone()
    }

    pub fn set_entry(&self, new_entry: Option<Arc<TaskEntry>>) {
        let mut current = self.current.lock();
        if let Some(old) = current.take() {
            old.remove();
        }
        *current = new_entry;
    }

    pub fn cancel(&self) {
        self.set_entry(None);
    }
}

/// A single-shot task wrapping a plain closure, run at most once.
pub struct SimpleTask {
    id: u64,
    delay_ms: i64,
    job: Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>,
    state: TaskState,
}

impl SimpleTask {
    pub fn new(id: u64, delay_ms: i64, job: impl FnOnce() + Send + 'static) -> Arc<dyn Task> {
        Arc::new(Self {
            id,
            delay_ms,
            job: Mutex::new(Some(Box::new(job))),
            state: TaskState::new(),
        })
    }
}

impl Task for SimpleTask {
    fn id(&self) -> u64 {
        self.id
    }

    fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    fn run(self: Arc<Self>) {
        if let Some(job) = self.job.lock().take() {
            job();
        }
    }

    fn cancel(&self) {
        self.state.cancel();
    }

    fn entry(&self) -> Option<Arc<TaskEntry>> {
        self.state.entry()
    }

    fn set_entry(&self, entry: Option<Arc<TaskEntry>>) {
        self.state.set_entry(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn simple_task_runs_its_closure_once() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        let task = SimpleTask::new(1, 0, move || ran_clone.store(true, Ordering::Relaxed));
        Arc::clone(&task).run();
        assert!(ran.load(Ordering::Relaxed));
    }

    #[test]
    fn setting_a_new_entry_invalidates_the_previous_one() {
        let task = SimpleTask::new(1, 0, || {});
        let first = TaskEntry::new(task.clone(), 100);
        assert!(!first.cancelled());
        let second = TaskEntry::new(task.clone(), 200);
        assert!(first.cancelled());
        assert!(!second.cancelled());
    }
}
