//! Domain model shared by the parser, store, and repository.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One day of forecast data.
///
/// The calendar date is the identity: records for the same date replace each
/// other, and `NaiveDate` carries no time-of-day, so lookups are exact-match
/// by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub date: NaiveDate,
    /// Upstream weather-condition code.
    pub weather_id: i32,
    pub temp_max: f64,
    pub temp_min: f64,
    /// Percent.
    pub humidity: i32,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
}

/// Reduced projection of [`ForecastRecord`] for list display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub date: NaiveDate,
    pub weather_id: i32,
    pub temp_max: f64,
    pub temp_min: f64,
}

impl From<&ForecastRecord> for ForecastSummary {
    fn from(record: &ForecastRecord) -> Self {
        Self {
            date: record.date,
            weather_id: record.weather_id,
            temp_max: record.temp_max,
            temp_min: record.temp_min,
        }
    }
}

/// Result of one successful fetch, discarded after being merged into the
/// store.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherResponse {
    pub forecast: Vec<ForecastRecord>,
}

/// Unit system sent to the forecast API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_query(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

/// Today's calendar date in UTC.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Epoch milliseconds of the date at UTC midnight; the storage key.
pub(crate) fn date_to_epoch_ms(date: NaiveDate) -> i64 {
    NaiveDateTime::new(date, NaiveTime::MIN).and_utc().timestamp_millis()
}

pub(crate) fn epoch_ms_to_date(ms: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(ms).unwrap_or_default().date_naive()
}
