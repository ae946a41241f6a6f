//! Record normalization
//!
//! Pure transformation of one raw observation into one canonical record.
//! Same input always yields the same record or the same rejection; nothing
//! here touches the filesystem or the clock.

use chrono::DateTime;
use thiserror::Error;

use crate::models::{RawObservation, WeatherRecord};

/// Timestamp format of `WeatherRecord::timestamp_utc`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Record-level failure. Never fatal to a batch: the transform stage counts
/// it and moves on to the next file.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// A required source field is absent, null, empty, or zero.
    ///
    /// Zero counts as missing on purpose: the behavior mirrors the
    /// upstream presence check, so a legitimate 0% humidity reading is
    /// rejected as well. Do not "fix" this without a fixture proving the
    /// new behavior.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// `dt` holds a value chrono cannot represent as a UTC timestamp
    #[error("unrepresentable observation time {0}")]
    InvalidTimestamp(i64),

    /// Input is not decodable as the expected nested-mapping shape
    #[error("malformed observation: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse one raw JSON document and normalize it.
pub fn normalize_json(raw: &str) -> Result<WeatherRecord, NormalizeError> {
    let obs: RawObservation = serde_json::from_str(raw)?;
    normalize(&obs)
}

/// Normalize one decoded observation into a canonical record.
///
/// Rejects the whole observation if any of the six required fields is
/// missing; never constructs a partially filled record.
pub fn normalize(obs: &RawObservation) -> Result<WeatherRecord, NormalizeError> {
    let city = required_str("name", obs.name.as_deref())?;
    let dt = match obs.dt {
        Some(v) if v != 0 => v,
        _ => return Err(NormalizeError::MissingField("dt")),
    };
    let temp_kelvin = required_num("main.temp", obs.main.temp)?;
    let humidity = required_num("main.humidity", obs.main.humidity)?;
    let wind_speed = required_num("wind.speed", obs.wind.speed)?;
    let description = required_str(
        "weather[0].description",
        obs.weather.first().and_then(|w| w.description.as_deref()),
    )?;

    let timestamp_utc = DateTime::from_timestamp(dt, 0)
        .ok_or(NormalizeError::InvalidTimestamp(dt))?
        .format(TIMESTAMP_FORMAT)
        .to_string();

    let temp_c = kelvin_to_celsius(temp_kelvin);
    let temp_f = celsius_to_fahrenheit(temp_c);

    Ok(WeatherRecord {
        city: city.to_string(),
        timestamp_utc,
        temperature_celsius: round2(temp_c),
        temperature_fahrenheit: round2(temp_f),
        humidity_percent: humidity,
        wind_speed_ms: wind_speed,
        weather_description: description.to_string(),
    })
}

fn required_str<'a>(
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, NormalizeError> {
    match value {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(NormalizeError::MissingField(field)),
    }
}

fn required_num(field: &'static str, value: Option<f64>) -> Result<f64, NormalizeError> {
    match value {
        Some(v) if v != 0.0 => Ok(v),
        _ => Err(NormalizeError::MissingField(field)),
    }
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - 273.15
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Round to 2 decimals, half away from zero (`f64::round` semantics).
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================
