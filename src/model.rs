//! Shared domain types for event detection and notification.
//!
//! Samples and rain periods are ephemeral (computed per invocation). Events are
//! handed to the notification layer and never retained here. Only
//! `NotificationRecord` has a store-backed lifecycle (see `notify::log`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// One 5-minute bucket of station readings, already unit-converted.
///
/// Every reading is optional: `None` means "no information for this bucket" and
/// is never treated as zero by detection. Field names on the wire follow the
/// station API (`temp_outdoor`, `pressure_relative`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub time: DateTime<Utc>,
    /// °C
    #[serde(default, rename = "temp_outdoor", alias = "temperature", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// %
    #[serde(default, rename = "humidity_outdoor", alias = "humidity", skip_serializing_if = "Option::is_none")]
    pub humidity: Option<i16>,
    /// mmHg, relative
    #[serde(default, rename = "pressure_relative", alias = "pressure", skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    /// m/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    /// m/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_gust: Option<f64>,
    /// degrees 0..360
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<i16>,
    /// mm/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain_rate: Option<f64>,
    /// mm since local midnight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain_daily: Option<f64>,
}

impl WeatherSample {
    /// Empty bucket at `time`; use the struct update syntax to fill readings.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time,
            ..Default::default()
        }
    }

    /// A bucket counts as raining only with a present, strictly positive rate.
    pub fn is_raining(&self) -> bool {
        matches!(self.rain_rate, Some(rate) if rate > 0.0)
    }
}

// ---------------------------------------------------------------------------
// Rain periods
// ---------------------------------------------------------------------------

/// One continuous rain episode: first to last raining bucket (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RainPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RainPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Duration as fractional hours (used for `WeatherEvent::change`).
    pub fn hours(&self) -> f64 {
        self.duration().num_seconds() as f64 / 3600.0
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RainStart,
    RainEnd,
    TempRise,
    TempDrop,
    WindGust,
    PressureRise,
    PressureDrop,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RainStart => "rain_start",
            EventType::RainEnd => "rain_end",
            EventType::TempRise => "temp_rise",
            EventType::TempDrop => "temp_drop",
            EventType::WindGust => "wind_gust",
            EventType::PressureRise => "pressure_rise",
            EventType::PressureDrop => "pressure_drop",
        }
    }

    /// Coarse bucket used for notification cooldowns. Both edges of rain and
    /// both directions of a trend share one category.
    pub fn category(&self) -> EventCategory {
        match self {
            EventType::RainStart | EventType::RainEnd => EventCategory::Rain,
            EventType::TempRise | EventType::TempDrop => EventCategory::Temperature,
            EventType::WindGust => EventCategory::Wind,
            EventType::PressureRise | EventType::PressureDrop => EventCategory::Pressure,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected, human-meaningful weather event.
///
/// The JSON field names are consumed by presentation layers; keep them stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub time: DateTime<Utc>,
    pub value: f64,
    pub value_from: f64,
    pub change: f64,
    pub period: String,
    pub description: String,
    pub details: String,
    pub icon: String,
}

impl WeatherEvent {
    pub fn category(&self) -> EventCategory {
        self.kind.category()
    }
}

// ---------------------------------------------------------------------------
// Categories and subscriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Rain,
    Temperature,
    Wind,
    Pressure,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Rain => "rain",
            EventCategory::Temperature => "temperature",
            EventCategory::Wind => "wind",
            EventCategory::Pressure => "pressure",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a recipient subscribed to: one category or everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subscription {
    All,
    Rain,
    Temperature,
    Wind,
    Pressure,
}

impl From<EventCategory> for Subscription {
    fn from(c: EventCategory) -> Self {
        match c {
            EventCategory::Rain => Subscription::Rain,
            EventCategory::Temperature => Subscription::Temperature,
            EventCategory::Wind => Subscription::Wind,
            EventCategory::Pressure => Subscription::Pressure,
        }
    }
}

impl FromStr for Subscription {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Subscription::All),
            "rain" => Ok(Subscription::Rain),
            "temperature" => Ok(Subscription::Temperature),
            "wind" => Ok(Subscription::Wind),
            "pressure" => Ok(Subscription::Pressure),
            other => anyhow::bail!("unknown subscription category: {other}"),
        }
    }
}

/// Opaque recipient identifier (a Telegram chat id in production).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub i64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the append-only notification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub recipient: RecipientId,
    pub category: EventCategory,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}
