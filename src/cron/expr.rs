// src/cron/expr.rs

use std::fmt;
use std::str::FromStr;

use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike};

use crate::cron::field::{
    self, contains, DAYS_OF_MONTH, DAYS_OF_WEEK, HOURS, MINUTES, MONTHS, SECONDS,
};
use crate::errors::{CronherdError, Result};

/// How far past the reference instant the search gives up.
///
/// Leap-day schedules pinned to a weekday can take decades to recur; 400
/// years covers a full Gregorian cycle.
const MAX_YEARS_AHEAD: i32 = 400;

/// A parsed six-field cron expression.
///
/// Field order: seconds, minutes, hours, day-of-month, month, day-of-week.
/// Day-of-month and day-of-week must both match for a day to be eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    seconds: u64,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(CronherdError::invalid_expression(
                expr,
                format!("expected 6 fields, found {}", fields.len()),
            ));
        }

        let parse = |kind: field::FieldKind, text: &str| {
            kind.parse(text)
                .map_err(|reason| CronherdError::invalid_expression(expr, reason))
        };

        Ok(Self {
            source: fields.join(" "),
            seconds: parse(SECONDS, fields[0])?,
            minutes: parse(MINUTES, fields[1])?,
            hours: parse(HOURS, fields[2])?,
            days_of_month: parse(DAYS_OF_MONTH, fields[3])?,
            months: parse(MONTHS, fields[4])?,
            days_of_week: parse(DAYS_OF_WEEK, fields[5])?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        contains(self.days_of_month, date.day())
            && contains(self.days_of_week, date.weekday().num_days_from_sunday())
    }

    fn naive_matches(&self, t: &NaiveDateTime) -> bool {
        contains(self.months, t.month())
            && self.day_matches(t.date())
            && contains(self.hours, t.hour())
            && contains(self.minutes, t.minute())
            && contains(self.seconds, t.second())
    }

    /// Whether every field matches the wall-clock reading of `at`.
    pub fn matches<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        self.naive_matches(&at.naive_local())
    }

    /// Next instant strictly after `after` whose wall-clock reading in
    /// `after`'s time zone matches every field.
    ///
    /// Returns `None` for expressions that can never match (e.g. 30 February).
    /// Wall-clock times skipped by a DST gap are passed over; for times that
    /// occur twice the earlier one is used.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let mut t = after.naive_local().with_nanosecond(0)? + TimeDelta::seconds(1);
        let limit = t.year() + MAX_YEARS_AHEAD;

        loop {
            if t.year() > limit {
                return None;
            }

            if !contains(self.months, t.month()) {
                let (y, m) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = NaiveDate::from_ymd_opt(y, m, 1)?.and_hms_opt(0, 0, 0)?;
                continue;
            }

            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }

            if !contains(self.hours, t.hour()) {
                t = t.date().and_hms_opt(t.hour(), 0, 0)? + TimeDelta::hours(1);
                continue;
            }

            if !contains(self.minutes, t.minute()) {
                t = t.date().and_hms_opt(t.hour(), t.minute(), 0)? + TimeDelta::minutes(1);
                continue;
            }

            if !contains(self.seconds, t.second()) {
                t += TimeDelta::seconds(1);
                continue;
            }

            let candidate = match tz.from_local_datetime(&t) {
                LocalResult::Single(dt) => Some(dt),
                LocalResult::Ambiguous(early, late) => {
                    if early > *after {
                        Some(early)
                    } else {
                        Some(late)
                    }
                }
                LocalResult::None => None,
            };

            match candidate {
                Some(dt) if dt > *after => return Some(dt),
                _ => t += TimeDelta::seconds(1),
            }
        }
    }
}

impl FromStr for CronExpr {
    type Err = CronherdError;

    fn from_str(s: &str) -> Result<Self> {
        CronExpr::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse `expr` and compute the next fire instant strictly after `after`.
///
/// `Ok(None)` means the expression is well formed but never fires.
pub fn next_fire<Tz: TimeZone>(expr: &str, after: &DateTime<Tz>) -> Result<Option<DateTime<Tz>>> {
    Ok(CronExpr::parse(expr)?.next_after(after))
}
