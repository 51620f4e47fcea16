use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter (info for the crate and its
/// `scheduler`/`dispatch` targets). `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("weather_events=info,scheduler=info,dispatch=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "weather_events_detected_total",
            "Events produced by detection, by type."
        );
        describe_counter!("notifications_sent_total", "Notifications delivered.");
        describe_counter!(
            "notifications_suppressed_total",
            "Notifications skipped by the per-category cooldown."
        );
        describe_counter!("notifications_failed_total", "Delivery failures.");
        describe_counter!(
            "notification_log_errors_total",
            "Notification log read/write errors."
        );
        describe_counter!(
            "subscriber_lookup_errors_total",
            "Subscriber fan-out lookup errors."
        );
        describe_counter!("sample_fetch_errors_total", "Sample source fetch errors.");
        describe_counter!("scheduler_runs_total", "Detection cycles started.");
        describe_counter!(
            "scheduler_skipped_busy_total",
            "Cycles skipped because the previous one was still running."
        );
        describe_histogram!("detect_duration_ms", "Detection time in milliseconds.");
        describe_gauge!("scheduler_last_run_ts", "Unix ts of the last finished cycle.");
    });
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
    }

    /// Serve the router on `listen` until the task is dropped.
    pub async fn serve(&self, listen: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(listen)
            .await
            .with_context(|| format!("bind metrics listener on {listen}"))?;
        tracing::info!("metrics listening on {listen}");
        axum::serve(listener, self.router())
            .await
            .context("metrics server")
    }
}
