//! Data models for the ETL pipeline

use serde::{Deserialize, Serialize};

// ============================================================================
// Raw Observation
// ============================================================================

/// One raw provider response, stored unmodified as one JSON file.
///
/// Only the paths the pipeline consumes are mapped; everything else in the
/// provider payload is ignored. Every field is optional here — presence
/// validation happens in [`normalize`](crate::normalize::normalize), not
/// during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObservation {
    /// Station or city name
    pub name: Option<String>,

    /// Observation time, Unix seconds (UTC)
    pub dt: Option<i64>,

    #[serde(default)]
    pub main: MainReadings,

    #[serde(default)]
    pub wind: WindReadings,

    /// The provider reports a list of conditions; only the first is used
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

/// The `main` block: temperature and humidity
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MainReadings {
    /// Temperature in Kelvin
    pub temp: Option<f64>,

    /// Relative humidity in percent
    pub humidity: Option<f64>,
}

/// The `wind` block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindReadings {
    /// Wind speed in m/s
    pub speed: Option<f64>,
}

/// One entry of the `weather` list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherCondition {
    pub description: Option<String>,
}

// ============================================================================
// Canonical Record
// ============================================================================

/// Normalized, validated row ready for tabular storage.
///
/// Field order is the artifact column order and the `weather_readings`
/// column order. Every field is present and non-null; a raw observation
/// missing any source field is rejected whole, never partially filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city: String,

    /// Fixed format "YYYY-MM-DD HH:MM:SS", UTC
    pub timestamp_utc: String,

    /// Rounded to 2 decimals
    pub temperature_celsius: f64,

    /// Rounded to 2 decimals
    pub temperature_fahrenheit: f64,

    pub humidity_percent: f64,

    pub wind_speed_ms: f64,

    pub weather_description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_observation_ignores_unknown_fields() {
        let json = r#"{
            "coord": {"lon": -0.13, "lat": 51.51},
            "name": "London",
            "dt": 1700000000,
            "main": {"temp": 283.15, "humidity": 80, "pressure": 1012},
            "wind": {"speed": 4.1, "deg": 80},
            "weather": [{"id": 500, "description": "light rain"}]
        }"#;

        let obs: RawObservation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.name.as_deref(), Some("London"));
        assert_eq!(obs.dt, Some(1700000000));
        assert_eq!(obs.main.temp, Some(283.15));
        assert_eq!(obs.main.humidity, Some(80.0));
        assert_eq!(obs.wind.speed, Some(4.1));
        assert_eq!(obs.weather[0].description.as_deref(), Some("light rain"));
    }

    #[test]
    fn test_raw_observation_missing_blocks_default() {
        let obs: RawObservation = serde_json::from_str(r#"{"name": "Nowhere"}"#).unwrap();
        assert_eq!(obs.dt, None);
        assert_eq!(obs.main.temp, None);
        assert_eq!(obs.wind.speed, None);
        assert!(obs.weather.is_empty());
    }
}
