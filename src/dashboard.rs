/// Chart series for the temperature and availability dashboards.
///
/// Pure data shaping over the store; rendering belongs to whatever front
/// end consumes the serialized series.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{AvailabilityStatus, PersistenceError, Reading};
use crate::store::WeatherStore;

const LABEL_FORMAT: &str = "%H:%M";
const EMPTY_LABEL: &str = "No data";

// ---------------------------------------------------------------------------
// Interval selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "24h")]
    Day,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::OneHour,
        Interval::FourHours,
        Interval::EightHours,
        Interval::TwelveHours,
        Interval::Day,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::EightHours => "8h",
            Interval::TwelveHours => "12h",
            Interval::Day => "24h",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Interval::OneHour => Duration::hours(1),
            Interval::FourHours => Duration::hours(4),
            Interval::EightHours => Duration::hours(8),
            Interval::TwelveHours => Duration::hours(12),
            Interval::Day => Duration::hours(24),
        }
    }

    /// Parses a label, falling back to one hour for anything unknown.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|i| i.label() == s)
            .ok_or_else(|| format!("unknown interval: {}", s))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSeries {
    pub station_name: String,
    pub interval: Interval,
    pub labels: Vec<String>,
    pub temperatures: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilitySeries {
    pub interval: Interval,
    pub labels: Vec<String>,
    /// 1 for up, 0 for down.
    pub statuses: Vec<u8>,
}

/// Temperatures of one station within the interval, oldest first.
///
/// `None` when the station does not exist.
pub fn temperature_series<S>(
    store: &S,
    station_id: i64,
    interval: Interval,
    now: DateTime<Utc>,
) -> Result<Option<TemperatureSeries>, PersistenceError>
where
    S: WeatherStore + ?Sized,
{
    let Some(station) = store.station(station_id)? else {
        return Ok(None);
    };

    let readings = store.readings_since(station_id, interval.window_start(now))?;
    Ok(Some(TemperatureSeries {
        station_name: station.name,
        interval,
        labels: readings
            .iter()
            .map(|r| r.timestamp.format(LABEL_FORMAT).to_string())
            .collect(),
        temperatures: readings.iter().map(|r| r.temperature).collect(),
    }))
}

/// Availability samples within the interval, oldest first.
pub fn availability_series<S>(
    store: &S,
    interval: Interval,
    now: DateTime<Utc>,
) -> Result<AvailabilitySeries, PersistenceError>
where
    S: WeatherStore + ?Sized,
{
    let samples = store.availability_since(interval.window_start(now))?;

    if samples.is_empty() {
        return Ok(AvailabilitySeries {
            interval,
            labels: vec![EMPTY_LABEL.to_string()],
            statuses: vec![0],
        });
    }

    Ok(AvailabilitySeries {
        interval,
        labels: samples
            .iter()
            .map(|s| s.timestamp.format(LABEL_FORMAT).to_string())
            .collect(),
        statuses: samples
            .iter()
            .map(|s| u8::from(s.status == AvailabilityStatus::Up))
            .collect(),
    })
}

/// Newest readings of one station.
pub fn latest_readings<S>(store: &S, station_id: i64, limit: usize) -> Result<Vec<Reading>, PersistenceError>
where
    S: WeatherStore + ?Sized,
{
    store.latest_readings(station_id, limit)
}

// ---------------------------------------------------------------------------
// Scheduled task outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaskCounts {
    pub successes: usize,
    pub failures: usize,
}

/// Outcomes of scheduled ingestion runs, kept in memory by the scheduler.
///
/// Entries older than the longest dashboard interval are dropped on record.
#[derive(Debug, Default)]
pub struct TaskStats {
    outcomes: Vec<(DateTime<Utc>, bool)>,
}

impl TaskStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at: DateTime<Utc>, success: bool) {
        let horizon = Interval::Day.window_start(at);
        self.outcomes.retain(|(t, _)| *t >= horizon);
        self.outcomes.push((at, success));
    }

    /// Successes and failures within `interval` before `now`.
    pub fn counts(&self, interval: Interval, now: DateTime<Utc>) -> TaskCounts {
        let since = interval.window_start(now);
        self.outcomes
            .iter()
            .filter(|(t, _)| *t >= since && *t <= now)
            .fold(TaskCounts::default(), |mut acc, (_, ok)| {
                if *ok {
                    acc.successes += 1;
                } else {
                    acc.failures += 1;
                }
                acc
            })
    }
}
