//! # Event Detection
//! Pure, synchronous entrypoint mapping a closed window of samples to a
//! minimal list of `WeatherEvent`s. No I/O, no shared state; the same input
//! always yields the same output.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::model::{WeatherEvent, WeatherSample};
use crate::rain::{self, DEFAULT_RAIN_GAP_MINUTES, DEFAULT_RAIN_MIN_DURATION_MINUTES};
use crate::trend::{
    self, DEFAULT_PRESSURE_THRESHOLD, DEFAULT_TEMP_THRESHOLD, DEFAULT_WIND_GUST_THRESHOLD,
};

/// Upper bound for every minute-valued option (one week).
pub const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;

fn default_rain_gap_minutes() -> i64 {
    DEFAULT_RAIN_GAP_MINUTES
}
fn default_rain_min_duration_minutes() -> i64 {
    DEFAULT_RAIN_MIN_DURATION_MINUTES
}
fn default_trend_window_minutes() -> i64 {
    60
}
fn default_pressure_window_minutes() -> i64 {
    180
}
fn default_temp_threshold() -> f64 {
    DEFAULT_TEMP_THRESHOLD
}
fn default_pressure_threshold() -> f64 {
    DEFAULT_PRESSURE_THRESHOLD
}
fn default_wind_gust_threshold() -> f64 {
    DEFAULT_WIND_GUST_THRESHOLD
}

/// Tunable detection options. Every field has a documented default so a
/// partial `[detection]` table in the config file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Dry gaps strictly shorter than this merge two rain periods.
    #[serde(default = "default_rain_gap_minutes")]
    pub rain_gap_minutes: i64,
    /// Merged rain periods strictly shorter than this are dropped.
    #[serde(default = "default_rain_min_duration_minutes")]
    pub rain_min_duration_minutes: i64,
    /// Look-back for the temperature trend.
    #[serde(default = "default_trend_window_minutes")]
    pub trend_window_minutes: i64,
    /// Look-back for the pressure trend (barometric tendency, 3h).
    #[serde(default = "default_pressure_window_minutes")]
    pub pressure_window_minutes: i64,
    /// °C per trend window.
    #[serde(default = "default_temp_threshold")]
    pub temp_threshold: f64,
    /// mmHg per pressure window.
    #[serde(default = "default_pressure_threshold")]
    pub pressure_threshold: f64,
    /// m/s, single-bucket peak.
    #[serde(default = "default_wind_gust_threshold")]
    pub wind_gust_threshold: f64,
    /// Keep only the newest N events (unset = no cap).
    #[serde(default)]
    pub max_events: Option<usize>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            rain_gap_minutes: default_rain_gap_minutes(),
            rain_min_duration_minutes: default_rain_min_duration_minutes(),
            trend_window_minutes: default_trend_window_minutes(),
            pressure_window_minutes: default_pressure_window_minutes(),
            temp_threshold: default_temp_threshold(),
            pressure_threshold: default_pressure_threshold(),
            wind_gust_threshold: default_wind_gust_threshold(),
            max_events: None,
        }
    }
}

impl DetectionConfig {
    pub fn trend_window(&self) -> Duration {
        Duration::minutes(self.trend_window_minutes)
    }

    pub fn pressure_window(&self) -> Duration {
        Duration::minutes(self.pressure_window_minutes)
    }

    /// Longest look-back any classifier needs; the scheduler fetches at least this much.
    pub fn max_window(&self) -> Duration {
        self.trend_window().max(self.pressure_window())
    }

    pub fn validate(&self) -> Result<(), DetectError> {
        let positive_minutes = [
            ("trend_window_minutes", self.trend_window_minutes),
            ("pressure_window_minutes", self.pressure_window_minutes),
        ];
        for (option, v) in positive_minutes {
            if !(1..=MAX_WINDOW_MINUTES).contains(&v) {
                return Err(DetectError::InvalidConfig {
                    option,
                    reason: format!("must be between 1 and {MAX_WINDOW_MINUTES}, got {v}"),
                });
            }
        }
        let non_negative_minutes = [
            ("rain_gap_minutes", self.rain_gap_minutes),
            ("rain_min_duration_minutes", self.rain_min_duration_minutes),
        ];
        for (option, v) in non_negative_minutes {
            if !(0..=MAX_WINDOW_MINUTES).contains(&v) {
                return Err(DetectError::InvalidConfig {
                    option,
                    reason: format!("must be between 0 and {MAX_WINDOW_MINUTES}, got {v}"),
                });
            }
        }
        let thresholds = [
            ("temp_threshold", self.temp_threshold),
            ("pressure_threshold", self.pressure_threshold),
            ("wind_gust_threshold", self.wind_gust_threshold),
        ];
        for (option, v) in thresholds {
            if !v.is_finite() || v <= 0.0 {
                return Err(DetectError::InvalidConfig {
                    option,
                    reason: format!("must be a positive number, got {v}"),
                });
            }
        }
        Ok(())
    }
}

/// Sort by time and keep one sample per timestamp (the last one seen).
/// Rejects non-finite readings.
pub fn normalize_samples(samples: &[WeatherSample]) -> Result<Vec<WeatherSample>, DetectError> {
    for s in samples {
        let fields = [
            ("temperature", s.temperature),
            ("pressure", s.pressure),
            ("wind_speed", s.wind_speed),
            ("wind_gust", s.wind_gust),
            ("rain_rate", s.rain_rate),
            ("rain_daily", s.rain_daily),
        ];
        for (field, v) in fields {
            if let Some(v) = v {
                if !v.is_finite() {
                    return Err(DetectError::InvalidInput {
                        field,
                        time: s.time,
                        reason: format!("non-finite reading {v}"),
                    });
                }
            }
        }
    }

    let mut out = samples.to_vec();
    // stable: among equal timestamps the original order is preserved
    out.sort_by_key(|s| s.time);

    let mut deduped: Vec<WeatherSample> = Vec::with_capacity(out.len());
    for s in out {
        match deduped.last_mut() {
            Some(last) if last.time == s.time => *last = s,
            _ => deduped.push(s),
        }
    }
    Ok(deduped)
}

/// Detect every event kind over `samples`, newest first.
pub fn detect_events(
    samples: &[WeatherSample],
    cfg: &DetectionConfig,
) -> Result<Vec<WeatherEvent>, DetectError> {
    cfg.validate()?;
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    let data = normalize_samples(samples)?;

    let mut events = rain::detect_rain_events(
        &data,
        cfg.rain_gap_minutes,
        cfg.rain_min_duration_minutes,
    );
    events.extend(trend::detect_temperature_changes(
        &data,
        cfg.trend_window(),
        cfg.temp_threshold,
    ));
    events.extend(trend::detect_wind_gust(&data, cfg.wind_gust_threshold));
    events.extend(trend::detect_pressure_changes(
        &data,
        cfg.pressure_window(),
        cfg.pressure_threshold,
    ));

    // newest first; stable keeps rain < temperature < wind < pressure on ties
    events.sort_by(|a, b| b.time.cmp(&a.time));
    if let Some(cap) = cfg.max_events {
        events.truncate(cap);
    }

    tracing::debug!(
        target: "detect",
        samples = data.len(),
        events = events.len(),
        "detection finished"
    );
    Ok(events)
}
