//! `Cron`: maps parsed schedules into recurring `SystemTimer::add` calls,
//! re-arming each entry after it fires.
//!
//! Grounded on `cron/cron.go`'s `Cron`/`Entry` structs and the
//! `AddFunc`/`AddJob`/`Schedule`/`Remove`/`Entry(id)` surface in
//! `cron/cron.go`'s public API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::cron::chain::{Chain, Job};
use crate::cron::schedule::{is_never, Schedule, ScheduleParser, StandardParser};
use crate::entry::TaskEntry;
use crate::error::CronResult;
use crate::task::{Task, TaskState};
use crate::timer::SystemTimer;

static NEXT_CRON_ID: AtomicU64 = AtomicU64::new(1);

fn next_cron_id() -> u64 {
    NEXT_CRON_ID.fetch_add(1, Ordering::Relaxed)
}

/// A read-only snapshot of a scheduled entry, mirroring the Go `Entry`
/// struct's public fields (`ID`, `Next`, `Prev`).
#[derive(Clone, Debug)]
pub struct EntrySnapshot {
    pub id: u64,
    pub next: DateTime<Utc>,
    pub prev: Option<DateTime<Utc>>,
    pub valid: bool,
}

/// A task that re-arms itself against its [`Schedule`] after each run.
struct RecurringEntry {
    id: u64,
    schedule: Box<dyn Schedule>,
    job: Arc<dyn Job>,
    timer: Arc<SystemTimer>,
    state: TaskState,
    next: Mutex<DateTime<Utc>>,
    prev: Mutex<Option<DateTime<Utc>>>,
    valid: AtomicBool,
}

impl RecurringEntry {
    fn delay_until(&self, when: DateTime<Utc>) -> i64 {
        (when - Utc::now()).num_milliseconds().max(0)
    }

    fn rearm(self: &Arc<Self>) {
        if !self.valid.load(Ordering::Acquire) {
            return;
        }
        let now = Utc::now();
        let next = self.schedule.next(now);
        *self.prev.lock() = Some(*self.next.lock());
        *self.next.lock() = next;
        if is_never(next) {
            debug!(entry_id = self.id, "schedule can never fire again, leaving entry unarmed");
            self.valid.store(false, Ordering::Release);
            return;
        }
        self.timer.add(self.clone());
    }

    fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            next: *self.next.lock(),
            prev: *self.prev.lock(),
            valid: self.valid.load(Ordering::Acquire),
        }
    }
}

impl Task for RecurringEntry {
    fn id(&self) -> u64 {
        self.id
    }

    fn delay_ms(&self) -> i64 {
        self.delay_until(*self.next.lock())
    }

    fn run(self: Arc<Self>) {
        if self.valid.load(Ordering::Acquire) {
            debug!(entry_id = self.id, "firing cron entry");
            self.job.run();
        }
        self.rearm();
    }

    fn cancel(&self) {
        self.valid.store(false, Ordering::Release);
        self.state.cancel();
    }

    fn entry(&self) -> Option<Arc<TaskEntry>> {
        self.state.entry()
    }

    fn set_entry(&self, entry: Option<Arc<TaskEntry>>) {
        self.state.set_entry(entry);
    }
}

/// The cron front-end: a thin adapter that repeatedly re-arms
/// [`SystemTimer`] entries from parsed [`Schedule`]s.
pub struct Cron {
    timer: Arc<SystemTimer>,
    parser: Box<dyn ScheduleParser>,
    chain: Chain,
    entries: Mutex<Vec<Arc<RecurringEntry>>>,
}

/// Construction options mirroring `cron/option.go`'s functional-options
/// pattern, expressed as builder methods — the idiomatic Rust shape for
/// this kind of optional configuration.
pub struct CronBuilder {
    timer: Arc<SystemTimer>,
    parser: Box<dyn ScheduleParser>,
    chain: Chain,
}

impl CronBuilder {
    pub fn parser(mut self, parser: Box<dyn ScheduleParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = chain;
        self
    }

    pub fn build(self) -> Cron {
        Cron {
            timer: self.timer,
            parser: self.parser,
            chain: self.chain,
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl Cron {
    /// A `Cron` backed by its own driver, with the standard parser and an
    /// empty wrapper chain.
    pub fn new(tick_ms: i64, wheel_size: i64) -> Cron {
        Self::builder(SystemTimer::new(tick_ms, wheel_size)).build()
    }

    pub fn builder(timer: Arc<SystemTimer>) -> CronBuilder {
        CronBuilder {
            timer,
            parser: Box::new(StandardParser),
            chain: Chain::default(),
        }
    }

    pub fn timer(&self) -> &Arc<SystemTimer> {
        &self.timer
    }

    /// Schedule a plain closure against a cron spec.
    pub fn add_func(&self, spec: &str, func: impl Fn() + Send + Sync + 'static) -> CronResult<u64> {
        self.add_job(spec, Arc::new(func))
    }

    /// Schedule a [`Job`] against a cron spec, parsed with this `Cron`'s
    /// configured [`ScheduleParser`].
    pub fn add_job(&self, spec: &str, job: Arc<dyn Job>) -> CronResult<u64> {
        let schedule = self.parser.parse(spec)?;
        Ok(self.schedule(schedule, job))
    }

    /// Schedule a pre-built [`Schedule`] directly, bypassing the parser.
    pub fn schedule(&self, schedule: Box<dyn Schedule>, job: Arc<dyn Job>) -> u64 {
        let id = next_cron_id();
        let wrapped = self.chain.then(job);
        let first_fire = schedule.next(Utc::now());
        // A spec can pass field-range validation yet still never match any
        // real date (e.g. "February 30th"); such a schedule is registered
        // for inspection via `entry(id)` but never armed against the timer.
        let armable = !is_never(first_fire);
        if !armable {
            debug!(entry_id = id, "schedule can never fire; registering without arming");
        }

        let entry = Arc::new(RecurringEntry {
            id,
            schedule,
            job: wrapped,
            timer: self.timer.clone(),
            state: TaskState::new(),
            next: Mutex::new(first_fire),
            prev: Mutex::new(None),
            valid: AtomicBool::new(armable),
        });

        self.entries.lock().push(entry.clone());
        if armable {
            self.timer.add(entry);
        }
        id
    }

    /// Cancel entry `id`. A no-op if it does not exist or was already
    /// removed.
    pub fn remove(&self, id: u64) {
        let mut entries = self.entries.lock();
        if let Some(pos) = entries.iter().position(|e| e.id == id) {
            entries[pos].cancel();
            entries.remove(pos);
        }
    }

    /// A snapshot of entry `id`'s scheduling state, or `None` if unknown.
    pub fn entry(&self, id: u64) -> Option<EntrySnapshot> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.snapshot())
    }

    /// All currently-registered entries, soonest-next-fire first.
    pub fn entries(&self) -> Vec<EntrySnapshot> {
        let mut snaps: Vec<_> = self.entries.lock().iter().map(|e| e.snapshot()).collect();
        snaps.sort_by_key(|e| e.next);
        snaps
    }

    /// Stop the underlying driver. Process-level lifecycle (running
    /// `advance_clock` on a background thread) is left to the caller.
    pub fn stop(&self) {
        self.timer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::CronError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn drive(timer: &Arc<SystemTimer>, deadline: Duration) {
        let (ctx, _cancel) = Context::with_timeout(deadline);
        while timer.advance_clock(&ctx) {}
    }

    /// A schedule firing every `period_ms`, for tests — standard cron
    /// syntax bottoms out at one-second resolution, too coarse to observe
    /// multiple firings inside a fast unit test.
    struct EveryMillis(i64);
    impl Schedule for EveryMillis {
        fn next(&self, after: DateTime<Utc>) -> DateTime<Utc> {
            after + chrono::Duration::milliseconds(self.0)
        }
    }

    #[test]
    fn recurring_entry_fires_repeatedly_until_removed() {
        let cron = Cron::new(5, 16);
        let fires = Arc::new(AtomicUsize::new(0));
        let fires_clone = fires.clone();
        let id = cron.schedule(
            Box::new(EveryMillis(20)),
            Arc::new(move || {
                fires_clone.fetch_add(1, Ordering::Relaxed);
            }),
        );

        drive(cron.timer(), Duration::from_millis(200));
        let first_count = fires.load(Ordering::Relaxed);
        assert!(first_count >= 2, "expected multiple firings, got {first_count}");

        cron.remove(id);
        drive(cron.timer(), Duration::from_millis(100));
        let after_remove = fires.load(Ordering::Relaxed);
        assert_eq!(after_remove, first_count, "no firings should occur after remove");
    }

    #[test]
    fn malformed_spec_is_rejected_without_scheduling() {
        let cron = Cron::new(5, 16);
        let err = cron.add_func("not a cron spec", || {}).unwrap_err();
        assert!(matches!(err, CronError::WrongFieldCount { .. }));
        assert!(cron.entries().is_empty());
    }

    #[test]
    fn a_spec_naming_a_day_that_never_occurs_is_accepted_but_never_fires() {
        // "0 0 0 30 2 *" passes field-range validation (day 30 <= 31) but
        // February never has a 30th day, so the spec can parse cleanly yet
        // never actually arm a firing. Must not panic.
        let cron = Cron::new(5, 16);
        let fires = Arc::new(AtomicUsize::new(0));
        let fires_clone = fires.clone();
        let id = cron
            .add_func("0 0 0 30 2 *", move || {
                fires_clone.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        let snapshot = cron.entry(id).unwrap();
        assert!(!snapshot.valid, "an unarmable schedule must be marked invalid");

        drive(cron.timer(), Duration::from_millis(50));
        assert_eq!(fires.load(Ordering::Relaxed), 0);
        assert_eq!(cron.timer().size(), 0);
    }

    #[test]
    fn remove_prevents_further_firings() {
        let cron = Cron::new(5, 16);
        let fires = Arc::new(AtomicUsize::new(0));
        let fires_clone = fires.clone();
        let id = cron
            .add_func("* * * * * *", move || {
                fires_clone.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        cron.remove(id);
        assert!(cron.entry(id).is_none());
        drive(cron.timer(), Duration::from_millis(50));
        assert_eq!(fires.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn entry_snapshot_reports_next_fire_time() {
        let cron = Cron::new(5, 16);
        let id = cron.add_func("* * * * * *", || {}).unwrap();
        let snapshot = cron.entry(id).unwrap();
        assert_eq!(snapshot.id, id);
        assert!(snapshot.valid);
        assert!(snapshot.prev.is_none());
    }
}
