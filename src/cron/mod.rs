//! Cron expression front-end, layered on top of the engine: parses a spec
//! into a [`schedule::Schedule`] and repeatedly re-arms entries against it.
//!
//! An external collaborator: the engine only depends on the `Schedule::next`
//! contract, not on this module's concrete grammar.

mod chain;
mod cron;
mod schedule;

pub use chain::{logging, recover, skip_if_still_running, Chain, Job, JobWrapper};
pub use cron::{Cron, CronBuilder, EntrySnapshot};
pub use schedule::{is_never, never, Schedule, ScheduleParser, StandardParser};
