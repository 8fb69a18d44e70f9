//! Error types.
//!
//! The engine itself never returns a `Result` to callers: `add` is a no-op
//! after shutdown, `advance_clock` returns `false` on an empty or cancelled
//! wait, and a corrupted delay-queue pop is a fatal invariant violation that
//! aborts rather than propagates. The only `Result`-returning surface is
//! cron spec parsing.

use thiserror::Error;

/// Result type for cron schedule parsing.
pub type CronResult<T> = Result<T, CronError>;

/// Errors produced while parsing a cron expression into a [`crate::cron::Schedule`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CronError {
    /// Wrong number of whitespace-separated fields.
    #[error("expected {expected} fields, found {found} in {spec:?}")]
    WrongFieldCount {
        expected: &'static str,
        found: usize,
        spec: String,
    },

    /// A field value fell outside its valid range.
    #[error("field {field} value {value} out of range {min}..={max}")]
    FieldOutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// A field's syntax (list/range/step) could not be parsed.
    #[error("field {field} has invalid syntax: {token:?}")]
    InvalidFieldSyntax { field: &'static str, token: String },

    /// A field matched no values at all (e.g. an empty range).
    #[error("field {field} matches no values: {token:?}")]
    EmptyField { field: &'static str, token: String },
}
