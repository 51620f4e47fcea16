//! Weather Events Service: binary entrypoint.
//! Loads config, wires source → detection → dispatch, serves `/metrics`, and
//! runs the periodic cycle until Ctrl-C.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use weather_events::config::AppConfig;
use weather_events::notify::log::JsonlNotificationLog;
use weather_events::notify::subscribers::StaticSubscribers;
use weather_events::notify::telegram::TelegramNotifier;
use weather_events::notify::{Dispatcher, LogNotifier, Notifier};
use weather_events::scheduler::EventScheduler;
use weather_events::source::HttpSampleSource;
use weather_events::telemetry::{init_tracing, Metrics};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    info!(
        "config loaded: source={}, interval={}s, lookback={}m, cooldown={}m, subscriptions={}, telegram={}",
        cfg.source.base_url,
        cfg.scheduler.interval_secs,
        cfg.scheduler.lookback_minutes,
        cfg.scheduler.cooldown_minutes,
        cfg.subscriptions.len(),
        cfg.telegram.enabled()
    );

    let metrics = Metrics::init()?;
    let listen = cfg.metrics.listen.clone();
    tokio::spawn(async move {
        if let Err(e) = metrics.serve(&listen).await {
            warn!("metrics server stopped: {e:#}");
        }
    });

    let source = HttpSampleSource::new(cfg.source.base_url.clone())
        .with_interval(cfg.source.interval.clone())
        .with_timeout(cfg.source.timeout_secs)?;

    let notifier: Arc<dyn Notifier> = if cfg.telegram.enabled() {
        Arc::new(
            TelegramNotifier::new(cfg.telegram.token.clone())
                .with_timeout(cfg.telegram.timeout_secs)
                .with_retries(cfg.telegram.max_retries)
                .with_offset(cfg.station.offset()?),
        )
    } else {
        warn!("no Telegram token configured; notifications are only logged");
        Arc::new(LogNotifier)
    };

    let subscribers = StaticSubscribers::from_entries(&cfg.subscriptions);
    if subscribers.is_empty() {
        warn!("no active subscriptions; events will be detected but not delivered");
    }

    let dispatcher = Dispatcher::new(
        notifier,
        Arc::new(JsonlNotificationLog::new(cfg.notify_log.path.clone())),
        Arc::new(subscribers),
    )
    .with_cooldown(cfg.scheduler.cooldown());

    let scheduler = Arc::new(EventScheduler::new(
        Arc::new(source),
        cfg.detection.clone(),
        dispatcher,
        cfg.scheduler.scheduler_cfg(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = scheduler.spawn(shutdown_rx);

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    let _ = handle.await;
    Ok(())
}
