//! Demo that runs detection over a sample window and prints the events as JSON.
//!
//! Usage: `detect_demo [samples.json]`. Without a file, a synthetic afternoon
//! (a 40-minute shower and a cold front) is generated.

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use std::path::PathBuf;
use weather_events::notify::{Dispatcher, LogNotifier};
use weather_events::notify::log::InMemoryNotificationLog;
use weather_events::notify::subscribers::{StaticSubscribers, SubscriptionEntry};
use weather_events::source::StaticSampleSource;
use weather_events::{detect_events, DetectionConfig, RecipientId, Subscription, WeatherSample};

fn synthetic_window() -> Vec<WeatherSample> {
    let t0 = Utc.with_ymd_and_hms(2025, 7, 14, 13, 0, 0).unwrap();
    (0..=36)
        .map(|i| {
            let raining = (12..20).contains(&i);
            let temp = if i < 18 { 27.0 } else { 27.0 - 0.4 * (i - 17) as f64 };
            WeatherSample {
                temperature: Some(temp),
                pressure: Some(748.0 + 0.1 * i as f64),
                wind_gust: Some(if i == 18 { 13.4 } else { 4.0 }),
                rain_rate: Some(if raining { 2.5 } else { 0.0 }),
                ..WeatherSample::at(t0 + Duration::minutes(5 * i))
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter("info")
        .init();

    let samples = match std::env::args().nth(1) {
        Some(p) => StaticSampleSource::from_json_file(&PathBuf::from(p))?
            .samples()
            .to_vec(),
        None => synthetic_window(),
    };

    let events = detect_events(&samples, &DetectionConfig::default())?;
    println!("{}", serde_json::to_string_pretty(&events)?);

    // Push the same events through the dispatcher twice: the second pass is
    // fully suppressed by the cooldown.
    let subscribers = StaticSubscribers::from_entries(&[SubscriptionEntry {
        recipient: RecipientId(1),
        categories: vec![Subscription::All],
        active: true,
    }]);
    let dispatcher = Dispatcher::new(
        std::sync::Arc::new(LogNotifier),
        std::sync::Arc::new(InMemoryNotificationLog::new()),
        std::sync::Arc::new(subscribers),
    );
    let now = samples.last().map(|s| s.time).unwrap_or_else(Utc::now);
    let first = dispatcher.dispatch(&events, now).await;
    let second = dispatcher.dispatch(&events, now + Duration::minutes(5)).await;
    println!("first pass: {first:?}\nsecond pass: {second:?}");
    Ok(())
}
