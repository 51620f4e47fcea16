// src/notify/dispatch.rs
//! Per event: category → subscribers → cooldown check → deliver → record.
//!
//! Failure policy:
//! - subscriber lookup fails: the event is skipped for this cycle.
//! - cooldown read fails: treated as "not sent" (fail-open, may duplicate).
//! - delivery fails: nothing is recorded, next cycle retries.
//! - record fails after delivery: logged; the next cycle may send a duplicate.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;

use super::cooldown::Cooldown;
use super::log::NotificationLog;
use super::subscribers::{fan_out, SubscriberDirectory};
use super::Notifier;
use crate::model::{RecipientId, WeatherEvent};

pub const DEFAULT_COOLDOWN_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub lookup_errors: usize,
    pub log_errors: usize,
}

impl DispatchReport {
    fn absorb(&mut self, other: DispatchReport) {
        self.sent += other.sent;
        self.suppressed += other.suppressed;
        self.failed += other.failed;
        self.lookup_errors += other.lookup_errors;
        self.log_errors += other.log_errors;
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    log: Arc<dyn NotificationLog>,
    subscribers: Arc<dyn SubscriberDirectory>,
    cooldown: Cooldown,
}

impl Dispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        log: Arc<dyn NotificationLog>,
        subscribers: Arc<dyn SubscriberDirectory>,
    ) -> Self {
        Self {
            notifier,
            log,
            subscribers,
            cooldown: Cooldown::minutes(DEFAULT_COOLDOWN_MINUTES),
        }
    }

    pub fn with_cooldown(mut self, window: Duration) -> Self {
        self.cooldown = Cooldown::new(window);
        self
    }

    pub fn cooldown(&self) -> Cooldown {
        self.cooldown
    }

    /// Dispatch events in the given order; earlier events win the cooldown.
    pub async fn dispatch(&self, events: &[WeatherEvent], now: DateTime<Utc>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for ev in events {
            report.absorb(self.dispatch_event(ev, now).await);
        }
        report
    }

    pub async fn dispatch_event(&self, event: &WeatherEvent, now: DateTime<Utc>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let category = event.category();

        let recipients = match fan_out(self.subscribers.as_ref(), category).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    target: "dispatch",
                    category = %category,
                    "subscriber lookup failed: {e:#}"
                );
                counter!("subscriber_lookup_errors_total").increment(1);
                report.lookup_errors += 1;
                return report;
            }
        };

        if recipients.is_empty() {
            tracing::trace!(target: "dispatch", category = %category, "no subscribers");
            return report;
        }

        tracing::info!(
            target: "dispatch",
            event_type = %event.kind,
            subscribers = recipients.len(),
            "sending notifications"
        );

        for recipient in recipients {
            report.absorb(self.deliver_one(recipient, event, now).await);
        }
        report
    }

    async fn deliver_one(
        &self,
        recipient: RecipientId,
        event: &WeatherEvent,
        now: DateTime<Utc>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let category = event.category();

        match self
            .log
            .was_recently_sent(recipient, category, self.cooldown.window(), now)
            .await
        {
            Ok(true) => {
                tracing::debug!(
                    target: "dispatch",
                    recipient = %recipient,
                    category = %category,
                    "suppressed by cooldown"
                );
                counter!("notifications_suppressed_total", "category" => category.as_str())
                    .increment(1);
                report.suppressed += 1;
                return report;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    target: "dispatch",
                    recipient = %recipient,
                    category = %category,
                    "cooldown check failed, sending anyway: {e:#}"
                );
                counter!("notification_log_errors_total", "op" => "read").increment(1);
                report.log_errors += 1;
            }
        }

        if let Err(e) = self.notifier.send(recipient, event).await {
            tracing::warn!(
                target: "dispatch",
                recipient = %recipient,
                event_type = %event.kind,
                notifier = self.notifier.name(),
                "delivery failed: {e:#}"
            );
            counter!("notifications_failed_total", "category" => category.as_str()).increment(1);
            report.failed += 1;
            return report;
        }

        let payload = serde_json::json!({
            "type": event.kind,
            "description": event.description,
            "value": event.value,
            "time": event.time,
        });
        if let Err(e) = self.log.record_sent(recipient, category, payload, now).await {
            tracing::warn!(
                target: "dispatch",
                recipient = %recipient,
                category = %category,
                "failed to record notification: {e:#}"
            );
            counter!("notification_log_errors_total", "op" => "write").increment(1);
            report.log_errors += 1;
        }

        counter!("notifications_sent_total", "category" => category.as_str()).increment(1);
        tracing::info!(
            target: "dispatch",
            recipient = %recipient,
            event_type = %event.kind,
            "notification sent"
        );
        report.sent += 1;
        report
    }
}
