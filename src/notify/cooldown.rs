// src/notify/cooldown.rs
use chrono::{DateTime, Duration, Utc};

/// Cooldown gate to prevent notification spam for one (recipient, category).
/// - Nothing sent yet: allowed.
/// - A send strictly inside the window ending at `now`: suppressed.
/// - A send exactly `window` ago no longer blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    window: Duration,
}

impl Cooldown {
    /// Negative windows are treated as 0 (no cooldown).
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::zero()),
        }
    }

    pub fn minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Earliest `sent_at` that still blocks at `now` (exclusive bound).
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    /// Does a previous send at `sent_at` block a new one at `now`?
    pub fn blocks(&self, sent_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        sent_at > self.since(now)
    }

    /// May we notify at `now` given the latest previous send?
    pub fn allows(&self, last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_sent {
            None => true,
            Some(ts) => !self.blocks(ts, now),
        }
    }
}
