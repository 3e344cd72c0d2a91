use crate::engine::schedule::ScheduleError;
use chrono::{DateTime, Datelike, DurationRound, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Iteration bound for [`CronExpr::next_after`]; a satisfiable expression always matches
/// within five years of minute boundaries.
const SEARCH_LIMIT_MINUTES: i64 = 5 * 366 * 24 * 60;

/// Standard five-field cron expression: minute, hour, day-of-month, month, day-of-week.
///
/// Each field is either the `*` wildcard or a single numeric value. Day-of-week is
/// Sunday-based (`0` or `7` both mean Sunday). Seconds and sub-second components are
/// always zeroed.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronExpr {
    source: String,
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum CronField {
    Any,
    Value(u32),
}

impl CronField {
    fn matches(&self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Value(expected) => *expected == value,
        }
    }

    fn parse(part: &str, min: u32, max: u32, field: &str) -> Result<Self, ScheduleError> {
        if part == "*" {
            return Ok(Self::Any);
        }
        let value: u32 = part.parse().map_err(|_| {
            ScheduleError::InvalidCron(format!("{field} field must be '*' or numeric, got {part:?}"))
        })?;
        if value < min || value > max {
            return Err(ScheduleError::InvalidCron(format!(
                "{field} field out of range [{min}, {max}]: {value}"
            )));
        }
        Ok(Self::Value(value))
    }
}

impl CronExpr {
    /// Next activation strictly after `after`, on a minute boundary.
    ///
    /// Returns `None` when no match exists within the search bound (an unsatisfiable
    /// calendar combination such as `0 0 30 2 *`).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let floor = after
            .duration_trunc(TimeDelta::minutes(1))
            .expect("minute truncation cannot fail for in-range datetimes");
        let mut candidate = floor;
        for _ in 0..SEARCH_LIMIT_MINUTES {
            candidate += TimeDelta::minutes(1);
            if self.matches(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn matches(&self, moment: DateTime<Utc>) -> bool {
        self.minute.matches(moment.minute())
            && self.hour.matches(moment.hour())
            && self.day_of_month.matches(moment.day())
            && self.month.matches(moment.month())
            && self
                .day_of_week
                .matches(moment.weekday().num_days_from_sunday())
    }
}

impl FromStr for CronExpr {
    type Err = ScheduleError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = parts.as_slice() else {
            return Err(ScheduleError::InvalidCron(format!(
                "expected 5 fields, got {}: {expression:?}",
                parts.len()
            )));
        };

        let day_of_week = match CronField::parse(day_of_week, 0, 7, "day-of-week")? {
            // Both 0 and 7 mean Sunday
            CronField::Value(7) => CronField::Value(0),
            field => field,
        };

        Ok(Self {
            source: expression.to_string(),
            minute: CronField::parse(minute, 0, 59, "minute")?,
            hour: CronField::parse(hour, 0, 23, "hour")?,
            day_of_month: CronField::parse(day_of_month, 1, 31, "day-of-month")?,
            month: CronField::parse(month, 1, 12, "month")?,
            day_of_week,
        })
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for CronExpr {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CronExpr> for String {
    fn from(value: CronExpr) -> Self {
        value.source
    }
}
