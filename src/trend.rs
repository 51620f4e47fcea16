//! Trend classifiers for temperature and pressure, plus the wind-gust peak.
//!
//! Trends compare each bucket with the bucket exactly one window earlier
//! (fixed 5-minute cadence, so the reference is looked up by timestamp).
//! Pairs where either reading is absent are skipped. Per metric, only the
//! strongest rise and the strongest drop survive.

use chrono::{DateTime, Duration, Utc};

use crate::format::window_label;
use crate::model::{EventType, WeatherEvent, WeatherSample};

pub const DEFAULT_TEMP_THRESHOLD: f64 = 3.0;
pub const DEFAULT_PRESSURE_THRESHOLD: f64 = 3.0;
pub const DEFAULT_WIND_GUST_THRESHOLD: f64 = 10.0;

/// One compared pair of readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta {
    pub time: DateTime<Utc>,
    pub from: f64,
    pub to: f64,
    pub change: f64,
}

/// Strongest `(rise, drop)` whose magnitude reaches `threshold`.
///
/// Ties on magnitude go to the later bucket.
pub fn strongest_deltas(
    samples: &[WeatherSample],
    window: Duration,
    threshold: f64,
    read: impl Fn(&WeatherSample) -> Option<f64>,
) -> (Option<Delta>, Option<Delta>) {
    let mut rise: Option<Delta> = None;
    let mut drop: Option<Delta> = None;

    for curr in samples {
        let Some(to) = read(curr) else { continue };
        let target = curr.time - window;
        let Ok(idx) = samples.binary_search_by_key(&target, |s| s.time) else {
            continue;
        };
        let Some(from) = read(&samples[idx]) else { continue };

        let d = Delta {
            time: curr.time,
            from,
            to,
            change: to - from,
        };
        if d.change >= threshold {
            if rise.map_or(true, |r| d.change >= r.change) {
                rise = Some(d);
            }
        } else if d.change <= -threshold && drop.map_or(true, |r| d.change <= r.change) {
            drop = Some(d);
        }
    }
    (rise, drop)
}

pub fn detect_temperature_changes(
    samples: &[WeatherSample],
    window: Duration,
    threshold: f64,
) -> Vec<WeatherEvent> {
    let (rise, drop) = strongest_deltas(samples, window, threshold, |s| s.temperature);
    let period = window_label(window);
    let mut events = Vec::new();

    if let Some(d) = rise {
        events.push(WeatherEvent {
            kind: EventType::TempRise,
            time: d.time,
            value: d.to,
            value_from: d.from,
            change: d.change,
            period: period.clone(),
            description: format!("Warmed up by {:.1}°C", d.change),
            details: format!("{:.1} → {:.1}°C {}", d.from, d.to, period),
            icon: "🌡️".to_string(),
        });
    }
    if let Some(d) = drop {
        events.push(WeatherEvent {
            kind: EventType::TempDrop,
            time: d.time,
            value: d.to,
            value_from: d.from,
            change: d.change,
            period: period.clone(),
            description: format!("Cooled down by {:.1}°C", -d.change),
            details: format!("{:.1} → {:.1}°C {}", d.from, d.to, period),
            icon: "🥶".to_string(),
        });
    }
    events
}

pub fn detect_pressure_changes(
    samples: &[WeatherSample],
    window: Duration,
    threshold: f64,
) -> Vec<WeatherEvent> {
    let (rise, drop) = strongest_deltas(samples, window, threshold, |s| s.pressure);
    let period = window_label(window);
    let mut events = Vec::new();

    if let Some(d) = rise {
        events.push(WeatherEvent {
            kind: EventType::PressureRise,
            time: d.time,
            value: d.to,
            value_from: d.from,
            change: d.change,
            period: period.clone(),
            description: format!("Pressure rising (+{:.1} mm)", d.change),
            details: format!("{:.0} → {:.0} mm {}", d.from, d.to, period),
            icon: "⬆️".to_string(),
        });
    }
    if let Some(d) = drop {
        events.push(WeatherEvent {
            kind: EventType::PressureDrop,
            time: d.time,
            value: d.to,
            value_from: d.from,
            change: d.change,
            period: period.clone(),
            description: format!("Pressure falling ({:.1} mm)", d.change),
            details: format!("{:.0} → {:.0} mm {}", d.from, d.to, period),
            icon: "⬇️".to_string(),
        });
    }
    events
}

/// Peak gust in the window, if it reaches `threshold`. Earliest peak wins ties.
pub fn detect_wind_gust(samples: &[WeatherSample], threshold: f64) -> Option<WeatherEvent> {
    let (time, peak) = samples
        .iter()
        .filter_map(|s| s.wind_gust.map(|g| (s.time, g)))
        .fold(None, |best: Option<(DateTime<Utc>, f64)>, (t, g)| match best {
            Some((_, b)) if b >= g => best,
            _ => Some((t, g)),
        })?;

    if peak < threshold {
        return None;
    }

    Some(WeatherEvent {
        kind: EventType::WindGust,
        time,
        value: peak,
        value_from: 0.0,
        change: 0.0,
        period: String::new(),
        description: format!("Wind gust {peak:.1} m/s"),
        details: String::new(),
        icon: "💨".to_string(),
    })
}
