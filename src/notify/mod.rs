//! Notification fan-out, cooldown dedup and delivery.

pub mod cooldown;
pub mod dispatch;
pub mod log;
pub mod subscribers;
pub mod telegram;

use anyhow::Result;

use crate::model::{RecipientId, WeatherEvent};

pub use dispatch::{DispatchReport, Dispatcher};

/// A delivery channel for one recipient at a time.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: RecipientId, event: &WeatherEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Used when no delivery channel is configured: logs what would be sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: RecipientId, event: &WeatherEvent) -> Result<()> {
        tracing::info!(
            target: "dispatch",
            recipient = %recipient,
            event_type = %event.kind,
            time = %event.time.to_rfc3339(),
            "{} {}",
            event.icon,
            event.description
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
