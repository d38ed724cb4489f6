//! Parser for the upstream forecast JSON.

use chrono::{Days, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::{ForecastRecord, WeatherResponse};

const SUCCESS_CODE: i64 = 200;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing or mistyped field: {0}")]
    Structure(String),
}

/// Result of parsing one response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Forecast(WeatherResponse),

    /// The API answered with a non-success status code (invalid location,
    /// upstream outage). An expected condition, not an error.
    NoData,
}

#[derive(Debug, Deserialize)]
struct DayEntry {
    pressure: f64,
    humidity: i32,
    speed: f64,
    deg: f64,
    weather: Vec<ConditionEntry>,
    temp: TempRange,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    id: i32,
}

#[derive(Debug, Deserialize)]
struct TempRange {
    max: f64,
    min: f64,
}

/// Parse a forecast response body into one record per reported day.
///
/// Day entries carry no date of their own: the i-th entry maps to
/// `start_day + i`. This trusts the upstream to emit entries in chronological
/// order starting today; a reordered response would produce silently wrong
/// dates.
///
/// The whole response is rejected on any missing or mistyped required field;
/// there are no partial results.
pub fn parse_forecast(body: &str, start_day: NaiveDate) -> Result<ParseOutcome, ParseError> {
    let envelope: Value = serde_json::from_str(body)?;

    // Status check comes first: a non-success `cod` means "no usable data"
    // regardless of what else is in the body.
    if let Some(cod) = envelope.get("cod") {
        let code =
            status_code(cod).ok_or_else(|| ParseError::Structure("cod".to_string()))?;
        if code != SUCCESS_CODE {
            return Ok(ParseOutcome::NoData);
        }
    }

    let list = envelope
        .get("list")
        .cloned()
        .ok_or_else(|| ParseError::Structure("list".to_string()))?;
    let days: Vec<DayEntry> =
        serde_json::from_value(list).map_err(|e| ParseError::Structure(e.to_string()))?;

    let mut forecast = Vec::with_capacity(days.len());
    for (i, day) in days.into_iter().enumerate() {
        let date = start_day
            .checked_add_days(Days::new(i as u64))
            .ok_or_else(|| ParseError::Structure("list exceeds calendar range".to_string()))?;
        forecast.push(record_from_entry(day, date)?);
    }

    Ok(ParseOutcome::Forecast(WeatherResponse { forecast }))
}

fn record_from_entry(day: DayEntry, date: NaiveDate) -> Result<ForecastRecord, ParseError> {
    // Exactly one condition is used; the upstream may report several.
    let condition = day
        .weather
        .first()
        .ok_or_else(|| ParseError::Structure("weather[0]".to_string()))?;

    Ok(ForecastRecord {
        date,
        weather_id: condition.id,
        temp_max: day.temp.max,
        temp_min: day.temp.min,
        humidity: day.humidity,
        pressure: day.pressure,
        wind_speed: day.speed,
        wind_direction: day.deg,
    })
}

/// The upstream emits `cod` as either an integer or a numeric string.
fn status_code(cod: &Value) -> Option<i64> {
    match cod {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
