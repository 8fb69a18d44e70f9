//! Cron schedule contract and the standard 6-field parser.
//!
//! Grounded on `cron/cron.go`'s `Schedule`/`ScheduleParser` interfaces and
//! `cron/parser.go`'s field grammar (seconds minutes hours
//! day-of-month month day-of-week — lists, ranges, steps, wildcards), the
//! concrete syntax `cron_test.go` actually exercises (`"1 * * * * *"`,
//! `"7/30 * * * * *"`, `"0/5 * * * * *"`).

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};

use crate::error::{CronError, CronResult};

/// Something that knows the next activation time strictly after `after`.
///
/// Total: a schedule that can never fire again (e.g. a day-of-month/month
/// combination that never exists, like "February 30th") returns [`never`]
/// rather than panicking or looping forever. Callers must check
/// [`is_never`] before arming a firing against the result.
pub trait Schedule: Send + Sync {
    fn next(&self, after: DateTime<Utc>) -> DateTime<Utc>;
}

/// Sentinel returned by [`Schedule::next`] to mean "this schedule will never
/// fire again". Matches `robfig/cron`'s zero-`time.Time` convention for the
/// same case, just at the opposite end of the timeline since this crate's
/// comparisons are "is it due yet", not "is it unset".
pub fn never() -> DateTime<Utc> {
    DateTime::<Utc>::MAX_UTC
}

/// Whether `t` is the [`never`] sentinel.
pub fn is_never(t: DateTime<Utc>) -> bool {
    t == DateTime::<Utc>::MAX_UTC
}

/// Turns a cron spec string into a [`Schedule`]. Pluggable via
/// [`crate::cron::CronBuilder::parser`]; only the `parse` contract matters
/// to the engine, not the grammar it accepts.
pub trait ScheduleParser: Send + Sync {
    fn parse(&self, spec: &str) -> CronResult<Box<dyn Schedule>>;
}

/// A single cron field: seconds/minutes (0-59), hours (0-23), day-of-month
/// (1-31), month (1-12), day-of-week (0-6, 0 = Sunday). Stored as a bitmask
/// since every field's range fits in a u64.
#[derive(Clone, Debug, PartialEq, Eq)]
struct FieldMask(u64);

impl FieldMask {
    fn contains(&self, value: u32) -> bool {
        self.0 & (1 << value) != 0
    }

    fn from_values(values: impl IntoIterator<Item = u32>) -> Self {
        let mut mask = 0u64;
        for v in values {
            mask |= 1 << v;
        }
        Self(mask)
    }
}

struct Field {
    name: &'static str,
    min: u32,
    max: u32,
}

const SECONDS: Field = Field { name: "seconds", min: 0, max: 59 };
const MINUTES: Field = Field { name: "minutes", min: 0, max: 59 };
const HOURS: Field = Field { name: "hours", min: 0, max: 23 };
const DAY_OF_MONTH: Field = Field { name: "day_of_month", min: 1, max: 31 };
const MONTH: Field = Field { name: "month", min: 1, max: 12 };
const DAY_OF_WEEK: Field = Field { name: "day_of_week", min: 0, max: 6 };

impl Field {
    fn parse(&self, token: &str) -> CronResult<FieldMask> {
        if token.is_empty() {
            return Err(CronError::EmptyField {
                field: self.name,
                token: token.to_string(),
            });
        }

        let mut values = Vec::new();
        for part in token.split(',') {
            values.extend(self.parse_range_or_step(part)?);
        }
        Ok(FieldMask::from_values(values))
    }

    fn parse_range_or_step(&self, part: &str) -> CronResult<Vec<u32>> {
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s.parse().map_err(|_| CronError::InvalidFieldSyntax {
                    field: self.name,
                    token: part.to_string(),
                })?;
                if step == 0 {
                    return Err(CronError::InvalidFieldSyntax {
                        field: self.name,
                        token: part.to_string(),
                    });
                }
                (r, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range_part == "*" {
            (self.min, self.max)
        } else if let Some((lo, hi)) = range_part.split_once('-') {
            let lo: u32 = lo.parse().map_err(|_| CronError::InvalidFieldSyntax {
                field: self.name,
                token: range_part.to_string(),
            })?;
            let hi: u32 = hi.parse().map_err(|_| CronError::InvalidFieldSyntax {
                field: self.name,
                token: range_part.to_string(),
            })?;
            (lo, hi)
        } else {
            let single: u32 = range_part.parse().map_err(|_| CronError::InvalidFieldSyntax {
                field: self.name,
                token: range_part.to_string(),
            })?;
            // A bare `N/step` (no explicit range) steps from N to the
            // field's max, e.g. "7/30" in seconds means {7, 37}.
            if step > 1 {
                (single, self.max)
            } else {
                (single, single)
            }
        };

        self.validate(start)?;
        self.validate(end)?;
        if start > end {
            return Err(CronError::InvalidFieldSyntax {
                field: self.name,
                token: part.to_string(),
            });
        }

        Ok((start..=end).step_by(step as usize).collect())
    }

    fn validate(&self, value: u32) -> CronResult<()> {
        if value < self.min || value > self.max {
            return Err(CronError::FieldOutOfRange {
                field: self.name,
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// A parsed standard cron schedule: six masks, one per field.
struct StandardSchedule {
    seconds: FieldMask,
    minutes: FieldMask,
    hours: FieldMask,
    day_of_month: FieldMask,
    month: FieldMask,
    day_of_week: FieldMask,
}

impl Schedule for StandardSchedule {
    fn next(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        // Start one second past `after`, rounding off sub-second remainder,
        // mirroring the Go source's truncation-then-add-a-second approach.
        let mut candidate = after
            .with_nanosecond(0)
            .unwrap_or(after)
            + ChronoDuration::seconds(1);

        // Five years is far beyond any sane cron cadence. A spec can still
        // pass field-range validation yet never actually match (e.g. day 30
        // of a month field restricted to February): rather than spinning
        // forever or aborting on a caller-supplied spec, report "never"
        // (see `never`) and let the cron front-end stop arming the entry.
        let search_limit = after + ChronoDuration::days(5 * 365);

        loop {
            if candidate > search_limit {
                return never();
            }

            if !self.month.contains(candidate.month()) {
                candidate = next_month_start(candidate);
                continue;
            }
            if !self.day_matches(candidate) {
                candidate = candidate
                    .with_hour(0)
                    .and_then(|d| d.with_minute(0))
                    .and_then(|d| d.with_second(0))
                    .unwrap_or(candidate)
                    + ChronoDuration::days(1);
                continue;
            }
            if !self.hours.contains(candidate.hour()) {
                candidate = candidate
                    .with_minute(0)
                    .and_then(|d| d.with_second(0))
                    .unwrap_or(candidate)
                    + ChronoDuration::hours(1);
                continue;
            }
            if !self.minutes.contains(candidate.minute()) {
                candidate = candidate.with_second(0).unwrap_or(candidate) + ChronoDuration::minutes(1);
                continue;
            }
            if !self.seconds.contains(candidate.second()) {
                candidate += ChronoDuration::seconds(1);
                continue;
            }
            return candidate;
        }
    }
}

impl StandardSchedule {
    fn day_matches(&self, candidate: DateTime<Utc>) -> bool {
        // Standard cron semantics: if both day-of-month and day-of-week are
        // restricted (not `*`), a match on *either* suffices.
        let dom_restricted = self.day_of_month != FieldMask::from_values(DAY_OF_MONTH.min..=DAY_OF_MONTH.max);
        let dow_restricted = self.day_of_week != FieldMask::from_values(DAY_OF_WEEK.min..=DAY_OF_WEEK.max);

        let dom_match = self.day_of_month.contains(candidate.day());
        let dow_match = self.day_of_week.contains(candidate.weekday().num_days_from_sunday());

        match (dom_restricted, dow_restricted) {
            (true, true) => dom_match || dow_match,
            _ => dom_match && dow_match,
        }
    }
}

fn next_month_start(from: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if from.month() == 12 {
        (from.year() + 1, 1)
    } else {
        (from.year(), from.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single().unwrap_or(from)
}

/// The default [`ScheduleParser`]: standard 6-field cron syntax.
#[derive(Default)]
pub struct StandardParser;

impl ScheduleParser for StandardParser {
    fn parse(&self, spec: &str) -> CronResult<Box<dyn Schedule>> {
        let fields: Vec<&str> = spec.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(CronError::WrongFieldCount {
                expected: "6 (seconds minutes hours day-of-month month day-of-week)",
                found: fields.len(),
                spec: spec.to_string(),
            });
        }

        Ok(Box::new(StandardSchedule {
            seconds: SECONDS.parse(fields[0])?,
            minutes: MINUTES.parse(fields[1])?,
            hours: HOURS.parse(fields[2])?,
            day_of_month: DAY_OF_MONTH.parse(fields[3])?,
            month: MONTH.parse(fields[4])?,
            day_of_week: DAY_OF_WEEK.parse(fields[5])?,
        }))
    }
}
