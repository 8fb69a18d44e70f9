//! Job wrapper chain: decorators applied around a user's callable before
//! scheduling, grounded on `cron/cron.go`'s `Job` interface and the
//! `Recover`/`SkipIfStillRunning`/logging wrapper functions it composes via
//! `JobWrapper`/`Chain`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, trace, warn};

/// The opaque capability the engine (and the cron front-end) schedule: a
/// callable with no return value. The engine only ever sees an opaque
/// `run()` capability, never the user's original closure type.
pub trait Job: Send + Sync {
    fn run(&self);
}

impl<F: Fn() + Send + Sync> Job for F {
    fn run(&self) {
        self()
    }
}

/// A function that wraps a [`Job`] in another, e.g. to add logging or
/// recovery around it.
pub type JobWrapper = Arc<dyn Fn(Arc<dyn Job>) -> Arc<dyn Job> + Send + Sync>;

/// An ordered pipeline of [`JobWrapper`]s, applied outermost-last so the
/// first wrapper given to [`Chain::new`] ends up as the outermost layer —
/// matching the Go source's `cron.NewChain(cron.Recover(logger),
/// cron.SkipIfStillRunning(logger))` left-to-right reading order.
#[derive(Clone, Default)]
pub struct Chain {
    wrappers: Vec<JobWrapper>,
}

impl Chain {
    pub fn new(wrappers: Vec<JobWrapper>) -> Self {
        Self { wrappers }
    }

    pub fn then(&self, job: Arc<dyn Job>) -> Arc<dyn Job> {
        self.wrappers
            .iter()
            .rev()
            .fold(job, |wrapped, wrapper| wrapper(wrapped))
    }
}

/// Wraps `job` so a panic inside it is caught and logged rather than
/// unwinding into the caller (the driver's background executor).
pub fn recover() -> JobWrapper {
    Arc::new(|job: Arc<dyn Job>| -> Arc<dyn Job> {
        Arc::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| job.run()));
            if let Err(payload) = result {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(panic = %message, "recovered panic in scheduled job");
            }
        })
    })
}

/// Releases a `skip_if_still_running` guard flag on drop, so the flag is
/// cleared even if `job.run()` unwinds. Pairing this with `recover()` as the
/// outermost wrapper (spec.md section 1's own ordering) means the panic is
/// caught upstream while this guard has already cleared the flag on the way
/// out — without it, one panicking firing would skip every firing after it,
/// forever.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Wraps `job` so a firing is skipped entirely if the previous firing of
/// the *same wrapped job* is still running, instead of queueing up.
pub fn skip_if_still_running() -> JobWrapper {
    Arc::new(|job: Arc<dyn Job>| -> Arc<dyn Job> {
        let running = Arc::new(AtomicBool::new(false));
        Arc::new(move || {
            if running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                warn!("skipping firing: previous run still in progress");
                return;
            }
            let _guard = RunningGuard(running.clone());
            job.run();
        })
    })
}

/// Wraps `job` with entry/exit trace logging.
pub fn logging() -> JobWrapper {
    Arc::new(|job: Arc<dyn Job>| -> Arc<dyn Job> {
        Arc::new(move || {
            trace!("job starting");
            job.run();
            trace!("job finished");
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    struct CountingJob(Arc<AtomicUsize>);
    impl Job for CountingJob {
        fn run(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn recover_suppresses_a_panic() {
        struct PanicsJob;
        impl Job for PanicsJob {
            fn run(&self) {
                panic!("boom");
            }
        }
        let chain = Chain::new(vec![recover()]);
        let wrapped = chain.then(Arc::new(PanicsJob));
        wrapped.run(); // must not propagate the panic
    }

    #[test]
    fn skip_if_still_running_drops_a_reentrant_firing() {
        let entered = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let entered_c = entered.clone();
        let completed_c = completed.clone();

        struct SlowJob {
            entered: Arc<AtomicUsize>,
            completed: Arc<AtomicUsize>,
            gate: Arc<Mutex<()>>,
        }
        impl Job for SlowJob {
            fn run(&self) {
                self.entered.fetch_add(1, Ordering::Relaxed);
                let _held = self.gate.lock().unwrap();
                std::thread::sleep(Duration::from_millis(30));
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let gate = Arc::new(Mutex::new(()));
        let chain = Chain::new(vec![skip_if_still_running()]);
        let wrapped = chain.then(Arc::new(SlowJob {
            entered: entered_c,
            completed: completed_c,
            gate: gate.clone(),
        }));

        let w1 = wrapped.clone();
        let h1 = std::thread::spawn(move || w1.run());
        std::thread::sleep(Duration::from_millis(10));
        wrapped.run(); // should be skipped: first run still holds the gate
        h1.join().unwrap();

        assert_eq!(entered.load(Ordering::Relaxed), 1);
        assert_eq!(completed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn skip_if_still_running_clears_its_flag_even_if_the_job_panics() {
        struct PanicsJob(Arc<AtomicUsize>);
        impl Job for PanicsJob {
            fn run(&self) {
                self.0.fetch_add(1, Ordering::Relaxed);
                panic!("boom");
            }
        }
        let entered = Arc::new(AtomicUsize::new(0));
        // recover() outermost, skip_if_still_running() inner — the pairing
        // spec.md section 1 names, and the one the fix must survive.
        let chain = Chain::new(vec![recover(), skip_if_still_running()]);
        let wrapped = chain.then(Arc::new(PanicsJob(entered.clone())));

        wrapped.run(); // first firing panics internally; recover() swallows it
        wrapped.run(); // must not be skipped: the guard flag must have cleared
        assert_eq!(
            entered.load(Ordering::Relaxed),
            2,
            "second firing was skipped, so the guard flag leaked across the panic"
        );
    }

    #[test]
    fn chain_applies_wrappers_and_still_runs_the_inner_job() {
        let count = Arc::new(AtomicUsize::new(0));
        let chain = Chain::new(vec![logging(), recover()]);
        let wrapped = chain.then(Arc::new(CountingJob(count.clone())));
        wrapped.run();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
