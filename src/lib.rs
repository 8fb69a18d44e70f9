//! A hierarchical timing-wheel scheduler with a cooperative clock-advance
//! driver and an optional cron-expression front-end.
//!
//! The engine ([`timer::SystemTimer`]) accepts tasks annotated with a delay
//! and runs each at or shortly after its scheduled firing time, using a
//! multi-level bucketed wheel (`wheel`) backed by a blocking delay queue
//! (`delay_queue`) of bucket expirations. No per-task timer thread is
//! spawned; a caller-owned loop repeatedly calls
//! [`timer::SystemTimer::advance_clock`] to drive the clock forward.
//!
//! The [`cron`] module is a thin, swappable front-end that maps cron
//! expressions into recurring [`timer::SystemTimer::add`] calls.

pub mod clock;
pub mod context;
pub mod cron;
pub mod delay_queue;
pub mod entry;
pub mod error;
pub mod executor;
pub mod heap;
pub mod task;
pub mod timer;
pub mod wheel;

pub use context::{CancelHandle, Context};
pub use cron::Cron;
pub use entry::TaskEntry;
pub use error::{CronError, CronResult};
pub use executor::{Executor, ThreadExecutor, TokioExecutor};
pub use task::{SimpleTask, Task};
pub use timer::SystemTimer;
