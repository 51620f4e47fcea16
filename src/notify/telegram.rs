use anyhow::{anyhow, Result};
use chrono::{FixedOffset, Offset, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Notifier;
use crate::format::notification_text;
use crate::model::{RecipientId, WeatherEvent};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Backoff stops doubling after 500ms << 6 (32s).
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Delay before retry number `attempt` (1-based).
fn retry_delay(attempt: u8) -> Duration {
    let shift = u32::from(attempt.saturating_sub(1)).min(MAX_BACKOFF_SHIFT);
    Duration::from_millis(500u64 << shift)
}

/// Delivers events as Markdown messages through the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    offset: FixedOffset,
}

impl TelegramNotifier {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
            offset: Utc.fix(),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Station-local offset used for the clock line in messages.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    fn payload(&self, recipient: RecipientId, event: &WeatherEvent) -> SendMessage {
        SendMessage {
            chat_id: recipient.0,
            text: notification_text(event, self.offset),
            parse_mode: "Markdown",
        }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, recipient: RecipientId, event: &WeatherEvent) -> Result<()> {
        let payload = self.payload(recipient, event);
        let url = self.endpoint();

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            // the URL embeds the bot token; never let it reach the logs
            let err = match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Telegram HTTP error: {:?}", e.status()),
                },
                Err(e) => anyhow!("Telegram request failed: {}", e.without_url()),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(
                target: "dispatch",
                attempt,
                recipient = %recipient,
                "telegram send retry: {err:#}"
            );
            tokio::time::sleep(retry_delay(attempt)).await;
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[derive(Debug, Serialize)]
struct SendMessage {
    chat_id: i64,
    text: String,
    parse_mode: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventType;
    use chrono::TimeZone;

    #[test]
    fn payload_targets_chat_and_uses_markdown() {
        let n = TelegramNotifier::new("T0KEN".into()).with_api_base("http://localhost:9/");
        assert_eq!(n.endpoint(), "http://localhost:9/botT0KEN/sendMessage");

        let ev = WeatherEvent {
            kind: EventType::RainEnd,
            time: Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap(),
            value: 0.0,
            value_from: 0.0,
            change: 0.5,
            period: String::new(),
            description: "Rain stopped (30m)".into(),
            details: String::new(),
            icon: "☁️".into(),
        };
        let body = serde_json::to_value(n.payload(RecipientId(-100123), &ev)).unwrap();
        assert_eq!(body["chat_id"], -100123);
        assert_eq!(body["parse_mode"], "Markdown");
        assert!(body["text"].as_str().unwrap().contains("*Rain stopped (30m)*"));
    }

    #[test]
    fn retry_delay_doubles_then_caps() {
        assert_eq!(retry_delay(1), Duration::from_millis(500));
        assert_eq!(retry_delay(3), Duration::from_secs(2));
        assert_eq!(retry_delay(7), Duration::from_secs(32));
        assert_eq!(retry_delay(200), Duration::from_secs(32));
        assert_eq!(retry_delay(u8::MAX), Duration::from_secs(32));
    }
}
