//! Time windows and hour-of-day buckets for sensor graphs.
//!
//! A graph covers three days of history and two days of forecast around
//! "now", sampled at a fixed list of hours (00:00, 03:00, ...). Everything
//! here is evaluated in the farm's local time zone.

use std::fmt::Display;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike};
use thiserror::Error;

/// Label format shared by the predicted-axis label and every bucket's
/// `currentDateTime`, e.g. `Tue Jan 02 2024 12:00`.
pub const LABEL_FORMAT: &str = "%a %b %d %Y %H:%M";

const HISTORY_DAYS: u64 = 3;
const FORECAST_DAYS: u64 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HoursError {
    #[error("hour list must not be empty")]
    Empty,
    #[error("hour {0} is outside 0..24")]
    OutOfRange(u32),
    #[error("hours must be strictly ascending")]
    NotAscending,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("local midnight does not exist on {0}")]
    NoLocalMidnight(NaiveDate),
}

/// Non-empty, strictly ascending list of hours of the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedHours(Vec<u32>);

impl AllowedHours {
    // ---
    pub fn new(hours: Vec<u32>) -> Result<Self, HoursError> {
        // ---
        if hours.is_empty() {
            return Err(HoursError::Empty);
        }
        if let Some(bad) = hours.iter().find(|h| **h >= 24) {
            return Err(HoursError::OutOfRange(*bad));
        }
        if hours.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HoursError::NotAscending);
        }
        Ok(Self(hours))
    }

    pub fn hours(&self) -> &[u32] {
        &self.0
    }

    /// Snap `hour` to the largest allowed hour not after it.
    ///
    /// Hours before the first allowed hour, or at/after the last one, snap to
    /// the last allowed hour.
    pub fn snap_hour(&self, hour: u32) -> u32 {
        // ---
        // Non-empty by construction.
        let first = self.0[0];
        let last = self.0[self.0.len() - 1];

        if hour < first || hour >= last {
            return last;
        }
        self.0
            .iter()
            .copied()
            .take_while(|h| *h <= hour)
            .last()
            .unwrap_or(last)
    }

    /// True when `time` sits exactly on one of the allowed hours.
    pub fn matches<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> bool {
        time.minute() == 0
            && time.second() == 0
            && time.nanosecond() == 0
            && self.0.binary_search(&time.hour()).is_ok()
    }
}

/// Label of the latest graph point at or before `now` (see [`AllowedHours::snap_hour`]).
pub fn predicted_axis_label<Tz: TimeZone>(now: &DateTime<Tz>, hours: &AllowedHours) -> String
where
    Tz::Offset: Display,
{
    // ---
    let hour = hours.snap_hour(now.hour());
    let snapped = now.date_naive().and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(hour));
    snapped.format(LABEL_FORMAT).to_string()
}

/// Label of a bucket timestamp in the farm's time zone.
pub fn bucket_label<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    time.format(LABEL_FORMAT).to_string()
}

/// The historical, current and predicted bounds of a sensor graph, as unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindows {
    pub historical_start: i64,
    pub current: i64,
    pub predicted_end: i64,
}

impl TimeWindows {
    // ---
    /// Windows around `now`: local midnight three days back, now, and local
    /// midnight two days ahead.
    pub fn around<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self, WindowError> {
        // ---
        let tz = now.timezone();
        let today = now.date_naive();
        let historical_date = today - Days::new(HISTORY_DAYS);
        let predicted_date = today + Days::new(FORECAST_DAYS);

        Ok(Self {
            historical_start: local_midnight(&tz, historical_date)?.timestamp(),
            current: now.timestamp(),
            predicted_end: local_midnight(&tz, predicted_date)?.timestamp(),
        })
    }

    /// Strictly inside `(historical_start, predicted_end)`.
    pub fn contains(&self, unix: i64) -> bool {
        self.historical_start < unix && unix < self.predicted_end
    }
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<DateTime<Tz>, WindowError> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .ok_or(WindowError::NoLocalMidnight(date))
}
