use crate::{
    data::model::Race,
    engine::{cron::CronExpr, EngineCtx},
};
use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use smol_str::SmolStr;
use thiserror::Error;

/// Callback executed when a schedule fires.
///
/// Receives the strategy and the engine handle; a callback that needs neither simply
/// ignores its arguments.
pub type ScheduleCallback<Strategy> =
    Box<dyn FnMut(&mut Strategy, &mut EngineCtx<'_, Strategy>)>;

/// All errors generated while registering schedules. Raised synchronously at registration.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ScheduleError {
    #[error("invalid time of day: {0:?}")]
    InvalidTimeOfDay(String),

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
}

/// When a scheduled callback should activate. Exactly one mode, enforced by the type.
#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    /// Fire daily at a wall time-of-day.
    Absolute(NaiveTime),
    /// Fire at `race.scheduled_at + offset` for each race in chronological order.
    Relative(TimeDelta),
    /// Fire on standard five-field cron activations.
    Cron(CronExpr),
}

impl Schedule {
    /// Absolute schedule from a `HH:MM[:SS]` time-of-day string.
    pub fn at(time_of_day: &str) -> Result<Self, ScheduleError> {
        let raw = time_of_day.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map(Self::Absolute)
            .map_err(|_| ScheduleError::InvalidTimeOfDay(time_of_day.to_string()))
    }

    /// Absolute schedule from a time value.
    pub fn at_time(time_of_day: NaiveTime) -> Self {
        Self::Absolute(time_of_day)
    }

    /// Absolute schedule from a datetime; only the time part is used.
    pub fn at_datetime(moment: NaiveDateTime) -> Self {
        Self::Absolute(moment.time())
    }

    /// Schedule relative to each race start.
    pub fn relative(offset: TimeDelta) -> Self {
        Self::Relative(offset)
    }

    /// Schedule relative to each race start, with the offset in seconds.
    pub fn relative_secs(seconds: i64) -> Self {
        Self::Relative(TimeDelta::seconds(seconds))
    }

    /// Cron schedule from a five-field expression.
    pub fn cron(expression: &str) -> Result<Self, ScheduleError> {
        expression.parse().map(Self::Cron)
    }
}

/// Mode-specific activation state for a [`ScheduleEntry`].
#[derive(Debug, Clone, PartialEq)]
enum ScheduleKind {
    Absolute {
        time_of_day: NaiveTime,
    },
    Relative {
        offset: TimeDelta,
        /// Index of the next race to consider; races before it are already processed.
        cursor: usize,
        /// Race the current `next_due` points at.
        target: usize,
    },
    Cron {
        expr: CronExpr,
    },
}

impl From<Schedule> for ScheduleKind {
    fn from(schedule: Schedule) -> Self {
        match schedule {
            Schedule::Absolute(time_of_day) => Self::Absolute { time_of_day },
            Schedule::Relative(offset) => Self::Relative {
                offset,
                cursor: 0,
                target: 0,
            },
            Schedule::Cron(expr) => Self::Cron { expr },
        }
    }
}

/// A registered callback with its activation state.
pub struct ScheduleEntry<Strategy> {
    pub name: SmolStr,
    callback: Option<ScheduleCallback<Strategy>>,
    kind: ScheduleKind,
    /// Next activation, `None` once the schedule is inactive.
    pub next_due: Option<DateTime<Utc>>,
}

impl<Strategy> std::fmt::Debug for ScheduleEntry<Strategy> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("next_due", &self.next_due)
            .finish()
    }
}

impl<Strategy> ScheduleEntry<Strategy> {
    pub(crate) fn new<Name>(
        name: Name,
        schedule: Schedule,
        callback: ScheduleCallback<Strategy>,
    ) -> Self
    where
        Name: Into<SmolStr>,
    {
        Self {
            name: name.into(),
            callback: Some(callback),
            kind: ScheduleKind::from(schedule),
            next_due: None,
        }
    }

    /// Relative offset for timeline-end computation, `None` for other modes.
    pub(crate) fn relative_offset(&self) -> Option<TimeDelta> {
        match &self.kind {
            ScheduleKind::Relative { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Take the callback out for invocation; restored with [`restore_callback`].
    ///
    /// [`restore_callback`]: ScheduleEntry::restore_callback
    pub(crate) fn take_callback(&mut self) -> Option<ScheduleCallback<Strategy>> {
        self.callback.take()
    }

    pub(crate) fn restore_callback(&mut self, callback: ScheduleCallback<Strategy>) {
        self.callback = Some(callback);
    }

    /// Compute the first activation for a run. Activations at exactly `current` are
    /// allowed here, but not on subsequent advancements.
    pub(crate) fn prepare(
        &mut self,
        current: DateTime<Utc>,
        races: &[Race],
        tick: TimeDelta,
        timeline_end: DateTime<Utc>,
    ) {
        self.next_due = match &mut self.kind {
            ScheduleKind::Absolute { time_of_day } => {
                Some(next_absolute(*time_of_day, current, true))
            }
            ScheduleKind::Relative {
                offset,
                cursor,
                target,
            } => {
                *cursor = 0;
                next_relative(*offset, current, races, cursor, target)
            }
            // Backdating by one tick lets an activation land exactly on the start time.
            ScheduleKind::Cron { expr } => expr.next_after(current - tick),
        };
        self.apply_timeline_end(timeline_end);
    }

    /// Advance past an activation that just fired.
    pub(crate) fn advance(
        &mut self,
        current: DateTime<Utc>,
        races: &[Race],
        timeline_end: DateTime<Utc>,
    ) {
        self.next_due = match &mut self.kind {
            ScheduleKind::Absolute { time_of_day } => {
                Some(next_absolute(*time_of_day, current, false))
            }
            ScheduleKind::Relative {
                offset,
                cursor,
                target,
            } => {
                *cursor = *target + 1;
                next_relative(*offset, current, races, cursor, target)
            }
            ScheduleKind::Cron { expr } => expr.next_after(current),
        };
        self.apply_timeline_end(timeline_end);
    }

    /// A schedule whose next activation exceeds the timeline end never fires again.
    fn apply_timeline_end(&mut self, timeline_end: DateTime<Utc>) {
        if self.next_due.is_some_and(|due| due > timeline_end) {
            self.next_due = None;
        }
    }
}

/// Next wall time whose time-of-day equals `time_of_day`, at or after `current`.
fn next_absolute(
    time_of_day: NaiveTime,
    current: DateTime<Utc>,
    allow_equal: bool,
) -> DateTime<Utc> {
    let candidate = current.date_naive().and_time(time_of_day).and_utc();
    if candidate < current || (candidate == current && !allow_equal) {
        candidate + TimeDelta::days(1)
    } else {
        candidate
    }
}

/// Next `race.scheduled_at + offset` at or after `current`, scanning forward from `cursor`
/// and skipping races whose activation already passed.
fn next_relative(
    offset: TimeDelta,
    current: DateTime<Utc>,
    races: &[Race],
    cursor: &mut usize,
    target: &mut usize,
) -> Option<DateTime<Utc>> {
    for index in *cursor..races.len() {
        let activation = races[index].scheduled_at + offset;
        if activation >= current {
            *target = index;
            return Some(activation);
        }
    }
    *target = races.len();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::RaceId;
    use std::str::FromStr;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::<Utc>::from_str(raw).unwrap()
    }

    fn race(race_id: &str, scheduled_at: &str) -> Race {
        Race::new(
            RaceId::new(race_id),
            utc(scheduled_at),
            "Tokyo".into(),
            1600,
            "turf".into(),
            "fine".into(),
            vec![],
        )
    }

    fn entry(schedule: Schedule) -> ScheduleEntry<()> {
        ScheduleEntry::new("test", schedule, Box::new(|_, _| {}))
    }

    fn far_end() -> DateTime<Utc> {
        utc("2030-01-01T00:00:00Z")
    }

    #[test]
    fn test_schedule_at_parses_time_of_day() {
        assert_eq!(
            Schedule::at("09:30").unwrap(),
            Schedule::Absolute(NaiveTime::from_hms_opt(9, 30, 0).unwrap())
        );
        assert_eq!(
            Schedule::at("09:30:15").unwrap(),
            Schedule::Absolute(NaiveTime::from_hms_opt(9, 30, 15).unwrap())
        );
        assert_eq!(
            Schedule::at("25:00"),
            Err(ScheduleError::InvalidTimeOfDay("25:00".to_string()))
        );
    }

    #[test]
    fn test_absolute_equality_allowed_only_on_prepare() {
        let mut entry = entry(Schedule::at("00:00").unwrap());
        let start = utc("2024-04-01T00:00:00Z");

        entry.prepare(start, &[], TimeDelta::seconds(1), far_end());
        assert_eq!(entry.next_due, Some(start));

        // After firing at the same instant, the next activation is tomorrow
        entry.advance(start, &[], far_end());
        assert_eq!(entry.next_due, Some(utc("2024-04-02T00:00:00Z")));
    }

    #[test]
    fn test_relative_walks_races_in_order() {
        let races = vec![
            race("R1", "2024-04-01T00:00:00Z"),
            race("R2", "2024-04-02T00:00:00Z"),
        ];
        let mut entry = entry(Schedule::relative(TimeDelta::hours(1)));
        let start = utc("2024-04-01T00:00:00Z");

        entry.prepare(start, &races, TimeDelta::seconds(1), far_end());
        assert_eq!(entry.next_due, Some(utc("2024-04-01T01:00:00Z")));

        entry.advance(utc("2024-04-01T01:00:00Z"), &races, far_end());
        assert_eq!(entry.next_due, Some(utc("2024-04-02T01:00:00Z")));

        entry.advance(utc("2024-04-02T01:00:00Z"), &races, far_end());
        assert_eq!(entry.next_due, None);
    }

    #[test]
    fn test_relative_skips_races_already_past() {
        let races = vec![
            race("R1", "2024-04-01T00:00:00Z"),
            race("R2", "2024-04-02T00:00:00Z"),
        ];
        let mut entry = entry(Schedule::relative(TimeDelta::hours(-2)));

        // Preparing mid-timeline skips the first race's activation
        entry.prepare(
            utc("2024-04-01T12:00:00Z"),
            &races,
            TimeDelta::seconds(1),
            far_end(),
        );
        assert_eq!(entry.next_due, Some(utc("2024-04-01T22:00:00Z")));
    }

    #[test]
    fn test_cron_prepare_catches_start_boundary() {
        let mut entry = entry(Schedule::cron("0 0 * * *").unwrap());
        let start = utc("2024-04-01T00:00:00Z");

        entry.prepare(start, &[], TimeDelta::seconds(1), far_end());
        assert_eq!(entry.next_due, Some(start));

        entry.advance(start, &[], far_end());
        assert_eq!(entry.next_due, Some(utc("2024-04-02T00:00:00Z")));
    }

    #[test]
    fn test_timeline_end_deactivates_schedule() {
        let mut entry = entry(Schedule::at("00:00").unwrap());
        let start = utc("2024-04-01T06:00:00Z");

        entry.prepare(start, &[], TimeDelta::seconds(1), utc("2024-04-01T12:00:00Z"));
        assert_eq!(entry.next_due, None);
    }
}
