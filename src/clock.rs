//! Monotonic millisecond clock.
//!
//! The engine only ever reasons about relative, monotonic time: bucket
//! placement, expiration comparisons and delay computation all use
//! milliseconds since an arbitrary epoch pinned at process start. Wall-clock
//! time (needed by the cron front-end to evaluate calendar fields) lives in
//! `cron::schedule` instead.

use std::sync::OnceLock;
use std::time::Instant;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Milliseconds elapsed since the process-wide monotonic epoch.
pub fn now_ms() -> i64 {
    epoch().elapsed().as_millis() as i64
}
