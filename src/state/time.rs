//! Time windows, the baseline dump schedule, and query time parsing.
use crate::error::ReplayError;
use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, Utc};

/// A closed interval of time, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeWindow, ReplayError> {
        if start > end {
            return Err(ReplayError::InvalidTimeWindow { start, end });
        }
        Ok(TimeWindow { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Whether `other` lies entirely inside this window. A window contains itself.
    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether `time` falls in `(start, end]`, the span replayed on top of a baseline taken at
    /// `start`.
    pub fn covers(&self, time: &DateTime<Utc>) -> bool {
        self.start < *time && *time <= self.end
    }

    /// Whether the two windows share at least one instant.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// `(year, month)` of every calendar month the window touches, in order.
    ///
    /// Update rows are partitioned by month, so a window crossing a month boundary has to be
    /// queried once per bucket.
    pub fn month_buckets(&self) -> Vec<(i32, u32)> {
        let (mut year, mut month) = (self.start.year(), self.start.month());
        let last = (self.end.year(), self.end.month());
        let mut buckets = vec![(year, month)];
        while (year, month) < last {
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
            buckets.push((year, month));
        }
        buckets
    }
}

/// When full table dumps are taken: every `interval`, shifted by `offset` from the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselineSchedule {
    pub interval: TimeDelta,
    pub offset: TimeDelta,
}

impl Default for BaselineSchedule {
    /// Daily at 00:00 UTC.
    fn default() -> Self {
        BaselineSchedule {
            interval: TimeDelta::days(1),
            offset: TimeDelta::zero(),
        }
    }
}

impl BaselineSchedule {
    fn interval_secs(&self) -> Result<i64, ReplayError> {
        match self.interval.num_seconds() {
            secs if secs > 0 => Ok(secs),
            _ => Err(ReplayError::InvalidTime(format!(
                "baseline interval must be at least one second, got {}",
                self.interval
            ))),
        }
    }

    /// The most recent scheduled dump instant at or before `time`.
    pub fn previous_boundary(&self, time: DateTime<Utc>) -> Result<DateTime<Utc>, ReplayError> {
        let interval = self.interval_secs()?;
        let offset = self.offset.num_seconds();
        let since = time.timestamp() - offset;
        let boundary = since - since.rem_euclid(interval) + offset;
        DateTime::from_timestamp(boundary, 0).ok_or_else(|| {
            ReplayError::InvalidTime(format!("no baseline boundary before {}", time))
        })
    }

    /// Whether a dump taken at `time` is one of the scheduled baselines.
    pub fn is_boundary(&self, time: DateTime<Utc>) -> bool {
        match self.previous_boundary(time) {
            Ok(boundary) => boundary == time,
            Err(_) => false,
        }
    }
}

/// Parses a query time. Only RFC 3339 timestamps with an explicit offset are accepted, since a
/// naive time cannot be placed on the baseline schedule.
pub fn parse_query_time(input: &str) -> Result<DateTime<Utc>, ReplayError> {
    let input = input.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(input) {
        return Ok(time.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(input, fmt).is_ok());
    match naive {
        true => Err(ReplayError::InvalidTime(format!(
            "{} has no timezone offset",
            input
        ))),
        false => Err(ReplayError::InvalidTime(format!(
            "{} is not an RFC 3339 timestamp",
            input
        ))),
    }
}
