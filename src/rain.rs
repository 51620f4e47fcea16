//! Rain pipeline: find raw periods, merge across short dry gaps, drop blips,
//! then classify each surviving period as `rain_start` (still raining at the
//! end of the window) or `rain_end` (closed by a later dry bucket).
//!
//! All functions are pure and expect samples in strictly ascending time order
//! (see `detect::normalize_samples`).

use chrono::Duration;

use crate::format::compact_duration;
use crate::model::{EventType, RainPeriod, WeatherEvent, WeatherSample};

pub const DEFAULT_RAIN_GAP_MINUTES: i64 = 30;
pub const DEFAULT_RAIN_MIN_DURATION_MINUTES: i64 = 15;

/// Maximal runs of raining buckets, in chronological order.
///
/// A bucket with an absent rain rate ends a run just like an explicit zero.
pub fn find_rain_periods(samples: &[WeatherSample]) -> Vec<RainPeriod> {
    let mut periods = Vec::new();
    let mut current: Option<RainPeriod> = None;

    for s in samples {
        if s.is_raining() {
            current = Some(match current {
                Some(p) => RainPeriod::new(p.start, s.time),
                None => RainPeriod::new(s.time, s.time),
            });
        } else if let Some(p) = current.take() {
            periods.push(p);
        }
    }

    if let Some(p) = current {
        periods.push(p);
    }
    periods
}

/// Fuse neighbours whose dry gap is strictly shorter than `max_gap_minutes`.
/// Fusion is transitive: a chain of short gaps becomes one period.
pub fn merge_rain_periods_with_short_pauses(
    periods: &[RainPeriod],
    max_gap_minutes: i64,
) -> Vec<RainPeriod> {
    let max_gap = Duration::minutes(max_gap_minutes);
    let mut merged: Vec<RainPeriod> = Vec::with_capacity(periods.len());

    for p in periods {
        match merged.last_mut() {
            Some(last) if p.start - last.end < max_gap => {
                if p.end > last.end {
                    last.end = p.end;
                }
            }
            _ => merged.push(*p),
        }
    }
    merged
}

/// Drop periods strictly shorter than `min_duration_minutes`; equal is kept.
pub fn filter_short_rains(periods: &[RainPeriod], min_duration_minutes: i64) -> Vec<RainPeriod> {
    let min = Duration::minutes(min_duration_minutes);
    periods
        .iter()
        .filter(|p| p.duration() >= min)
        .copied()
        .collect()
}

/// Full rain pipeline over a normalised sample slice.
pub fn detect_rain_events(
    samples: &[WeatherSample],
    gap_minutes: i64,
    min_duration_minutes: i64,
) -> Vec<WeatherEvent> {
    let Some(last) = samples.last() else {
        return Vec::new();
    };

    let raw = find_rain_periods(samples);
    let merged = merge_rain_periods_with_short_pauses(&raw, gap_minutes);
    let kept = filter_short_rains(&merged, min_duration_minutes);

    tracing::trace!(
        target: "detect",
        raw = raw.len(),
        merged = merged.len(),
        kept = kept.len(),
        "rain periods"
    );

    let still_raining = last.is_raining();
    kept.iter()
        .map(|p| {
            if still_raining && p.end == last.time {
                rain_start_event(p)
            } else {
                rain_end_event(p)
            }
        })
        .collect()
}

fn rain_start_event(p: &RainPeriod) -> WeatherEvent {
    let so_far = compact_duration(p.duration());
    WeatherEvent {
        kind: EventType::RainStart,
        time: p.start,
        value: 0.0,
        value_from: 0.0,
        change: p.hours(),
        period: String::new(),
        description: format!("Raining for {so_far}"),
        details: String::new(),
        icon: "🌧️".to_string(),
    }
}

fn rain_end_event(p: &RainPeriod) -> WeatherEvent {
    let lasted = compact_duration(p.duration());
    WeatherEvent {
        kind: EventType::RainEnd,
        time: p.end,
        value: 0.0,
        value_from: 0.0,
        change: p.hours(),
        period: String::new(),
        description: format!("Rain stopped ({lasted})"),
        details: format!(
            "{} → {} UTC",
            p.start.format("%H:%M"),
            p.end.format("%H:%M")
        ),
        icon: "☁️".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    fn at(min: i64, rate: Option<f64>) -> WeatherSample {
        WeatherSample {
            rain_rate: rate,
            ..WeatherSample::at(t0() + Duration::minutes(min))
        }
    }

    fn period(from: i64, to: i64) -> RainPeriod {
        RainPeriod::new(t0() + Duration::minutes(from), t0() + Duration::minutes(to))
    }

    #[test]
    fn finder_splits_on_dry_bucket() {
        let data = vec![
            at(0, Some(0.5)),
            at(5, Some(0.5)),
            at(10, Some(0.0)),
            at(15, Some(0.5)),
            at(20, Some(0.5)),
        ];
        let periods = find_rain_periods(&data);
        assert_eq!(periods, vec![period(0, 5), period(15, 20)]);
    }

    #[test]
    fn finder_treats_absent_rate_as_dry() {
        let data = vec![at(0, Some(1.0)), at(5, None), at(10, Some(1.0))];
        assert_eq!(find_rain_periods(&data).len(), 2);
    }

    #[test]
    fn finder_single_bucket_period() {
        let data = vec![at(0, Some(0.0)), at(5, Some(0.3)), at(10, Some(0.0))];
        assert_eq!(find_rain_periods(&data), vec![period(5, 5)]);
    }

    #[test]
    fn merge_short_pause_and_keep_long() {
        let periods = vec![period(0, 20), period(25, 45), period(80, 100)];
        let merged = merge_rain_periods_with_short_pauses(&periods, 30);
        assert_eq!(merged, vec![period(0, 45), period(80, 100)]);
    }

    #[test]
    fn merge_is_transitive() {
        let periods = vec![period(0, 10), period(20, 30), period(40, 50), period(60, 70)];
        let merged = merge_rain_periods_with_short_pauses(&periods, 30);
        assert_eq!(merged, vec![period(0, 70)]);
    }

    #[test]
    fn merge_gap_equal_to_threshold_stays_split() {
        let periods = vec![period(0, 10), period(40, 50)];
        let merged = merge_rain_periods_with_short_pauses(&periods, 30);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn filter_keeps_exact_minimum() {
        let periods = vec![period(0, 10), period(0, 15), period(0, 30)];
        let filtered = filter_short_rains(&periods, 15);
        assert_eq!(filtered, vec![period(0, 15), period(0, 30)]);
    }

    #[test]
    fn open_period_yields_rain_start_at_period_start() {
        let data: Vec<_> = (0..=4).map(|i| at(i * 5, Some(0.5))).collect();
        let events = detect_rain_events(&data, 30, 15);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventType::RainStart);
        assert_eq!(events[0].time, t0());
        assert!((events[0].change - 20.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn closed_period_yields_rain_end_at_period_end() {
        let mut data: Vec<_> = (0..=6).map(|i| at(i * 5, Some(0.5))).collect();
        data.push(at(35, Some(0.0)));
        let events = detect_rain_events(&data, 30, 15);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventType::RainEnd);
        assert_eq!(events[0].time, t0() + Duration::minutes(30));
        assert_eq!(events[0].icon, "☁️");
        assert_eq!(events[0].description, "Rain stopped (30m)");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(detect_rain_events(&[], 30, 15).is_empty());
    }
}
