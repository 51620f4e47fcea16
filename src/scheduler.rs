// src/scheduler.rs
//! Fixed-interval detection/notification cycle.
//!
//! One cycle: fetch window → detect → keep events that became visible inside
//! the look-back → dispatch. A cycle that finds another one still running is
//! skipped, so slow I/O cannot cause two cycles to double-send.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::detect::{detect_events, DetectionConfig};
use crate::model::{EventType, WeatherEvent, WeatherSample};
use crate::notify::{DispatchReport, Dispatcher};
use crate::source::SampleSource;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    /// Events older than `now - lookback` are not dispatched.
    pub lookback: ChronoDuration,
    pub fetch_timeout: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            lookback: ChronoDuration::minutes(60),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub samples: usize,
    pub detected: usize,
    pub in_window: usize,
    pub dispatch: DispatchReport,
}

pub struct EventScheduler {
    source: Arc<dyn SampleSource>,
    detection: DetectionConfig,
    dispatcher: Dispatcher,
    cfg: SchedulerCfg,
    in_flight: Mutex<()>,
}

impl EventScheduler {
    pub fn new(
        source: Arc<dyn SampleSource>,
        detection: DetectionConfig,
        dispatcher: Dispatcher,
        cfg: SchedulerCfg,
    ) -> Self {
        Self {
            source,
            detection,
            dispatcher,
            cfg,
            in_flight: Mutex::new(()),
        }
    }

    /// Fetch span: the look-back, widened so every trend has its reference bucket.
    pub fn fetch_span(&self) -> ChronoDuration {
        self.cfg.lookback.max(self.detection.max_window())
    }

    /// Run one cycle at `now`. `Ok(None)` means another cycle was still running.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<Option<CycleReport>> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!(target: "scheduler", "previous cycle still running, skipping");
            counter!("scheduler_skipped_busy_total").increment(1);
            return Ok(None);
        };
        counter!("scheduler_runs_total").increment(1);

        self.detection.validate().context("detection config")?;
        let from = now
            .checked_sub_signed(self.fetch_span())
            .context("fetch span out of range")?;
        let window_start = now
            .checked_sub_signed(self.cfg.lookback)
            .context("look-back out of range")?;
        let samples = match tokio::time::timeout(
            self.cfg.fetch_timeout,
            self.source.fetch(from, now),
        )
        .await
        {
            Ok(res) => res.with_context(|| format!("fetch samples from {}", self.source.name())),
            Err(_) => Err(anyhow::anyhow!(
                "fetch samples from {} timed out after {:?}",
                self.source.name(),
                self.cfg.fetch_timeout
            )),
        }
        .inspect_err(|_| counter!("sample_fetch_errors_total").increment(1))?;

        let started = Instant::now();
        let events = detect_events(&samples, &self.detection).context("detect events")?;
        histogram!("detect_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        for ev in &events {
            counter!("weather_events_detected_total", "type" => ev.kind.as_str()).increment(1);
        }

        // half-open, so back-to-back cycles never both claim a boundary bucket
        let fresh: Vec<_> = events
            .iter()
            .filter(|e| {
                let seen = visible_at(e, &samples);
                seen > window_start && seen <= now
            })
            .cloned()
            .collect();

        let dispatch = if fresh.is_empty() {
            DispatchReport::default()
        } else {
            tracing::info!(target: "scheduler", count = fresh.len(), "processing events");
            self.dispatcher.dispatch(&fresh, now).await
        };

        gauge!("scheduler_last_run_ts").set(now.timestamp() as f64);
        let report = CycleReport {
            samples: samples.len(),
            detected: events.len(),
            in_window: fresh.len(),
            dispatch,
        };
        tracing::info!(
            target: "scheduler",
            samples = report.samples,
            detected = report.detected,
            in_window = report.in_window,
            sent = report.dispatch.sent,
            suppressed = report.dispatch.suppressed,
            failed = report.dispatch.failed,
            "cycle finished"
        );
        Ok(Some(report))
    }

    /// Run immediately, then on every tick, until `shutdown` flips to `true`.
    /// Cycles run as their own tasks so a slow one never delays shutdown; the
    /// in-flight cycle is awaited before returning.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.cfg.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(target: "scheduler", interval = ?self.cfg.interval, "scheduler started");

        let mut last: Option<JoinHandle<()>> = None;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    last = Some(tokio::spawn(async move {
                        if let Err(e) = this.run_cycle(Utc::now()).await {
                            tracing::warn!(target: "scheduler", "cycle failed: {e:#}");
                        }
                    }));
                }
            }
        }

        if let Some(h) = last {
            let _ = h.await;
        }
        tracing::info!(target: "scheduler", "scheduler stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

/// The bucket whose arrival made `event` detectable.
///
/// Rain events are anchored to the period, not to the bucket that revealed
/// them: an ongoing rain only shows once it is long enough (the last
/// bucket), and a finished one only once a dry bucket follows it.
fn visible_at(event: &WeatherEvent, samples: &[WeatherSample]) -> DateTime<Utc> {
    match event.kind {
        EventType::RainStart => samples
            .iter()
            .map(|s| s.time)
            .max()
            .unwrap_or(event.time),
        EventType::RainEnd => samples
            .iter()
            .map(|s| s.time)
            .filter(|t| *t > event.time)
            .min()
            .unwrap_or(event.time),
        _ => event.time,
    }
}
