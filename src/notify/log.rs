// src/notify/log.rs
//! Append-only notification log: the only state that survives between cycles.
//!
//! The dedup check is read-then-write and not atomic; it assumes a single
//! writer (the scheduler's single-flight guard provides that in-process).

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::cooldown::Cooldown;
use crate::model::{EventCategory, NotificationRecord, RecipientId};

#[async_trait::async_trait]
pub trait NotificationLog: Send + Sync {
    /// Was anything of `category` sent to `recipient` within `within` before `now`?
    async fn was_recently_sent(
        &self,
        recipient: RecipientId,
        category: EventCategory,
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Append one record.
    async fn record_sent(
        &self,
        recipient: RecipientId,
        category: EventCategory,
        payload: serde_json::Value,
        sent_at: DateTime<Utc>,
    ) -> Result<()>;
}

fn matches_recent(
    rec: &NotificationRecord,
    recipient: RecipientId,
    category: EventCategory,
    cooldown: Cooldown,
    now: DateTime<Utc>,
) -> bool {
    rec.recipient == recipient && rec.category == category && cooldown.blocks(rec.sent_at, now)
}

// --- In-memory ---

#[derive(Debug, Default)]
pub struct InMemoryNotificationLog {
    records: Mutex<Vec<NotificationRecord>>,
}

impl InMemoryNotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<NotificationRecord> {
        self.records.lock().clone()
    }
}

#[async_trait::async_trait]
impl NotificationLog for InMemoryNotificationLog {
    async fn was_recently_sent(
        &self,
        recipient: RecipientId,
        category: EventCategory,
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let cd = Cooldown::new(within);
        let records = self.records.lock();
        Ok(records
            .iter()
            .any(|r| matches_recent(r, recipient, category, cd, now)))
    }

    async fn record_sent(
        &self,
        recipient: RecipientId,
        category: EventCategory,
        payload: serde_json::Value,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        self.records.lock().push(NotificationRecord {
            recipient,
            category,
            payload,
            sent_at,
        });
        Ok(())
    }
}

// --- JSON lines file ---

/// One JSON record per line; the file is only ever appended to.
///
/// The file is parsed once, on first use; afterwards checks are answered from
/// memory and every write goes to both. Assumes this handle is the only writer.
#[derive(Debug)]
pub struct JsonlNotificationLog {
    path: PathBuf,
    records: tokio::sync::Mutex<Option<Vec<NotificationRecord>>>,
}

impl JsonlNotificationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: tokio::sync::Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<NotificationRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let mut out = Vec::new();
        for (no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<NotificationRecord>(line) {
                Ok(r) => out.push(r),
                Err(e) => tracing::warn!(
                    target: "dispatch",
                    path = %self.path.display(),
                    line = no + 1,
                    "skipping malformed notification record: {e}"
                ),
            }
        }
        tracing::debug!(
            target: "dispatch",
            path = %self.path.display(),
            records = out.len(),
            "notification log loaded"
        );
        Ok(out)
    }

    /// Loaded records; a failed load is retried on the next call.
    async fn loaded<'a>(
        &self,
        slot: &'a mut Option<Vec<NotificationRecord>>,
    ) -> Result<&'a mut Vec<NotificationRecord>> {
        if slot.is_none() {
            *slot = Some(self.read_all().await?);
        }
        Ok(slot.get_or_insert_with(Vec::new))
    }

    async fn append_line(&self, line: &str) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("append notification record")?;
        file.flush().await.context("flush notification log")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationLog for JsonlNotificationLog {
    async fn was_recently_sent(
        &self,
        recipient: RecipientId,
        category: EventCategory,
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let cd = Cooldown::new(within);
        let mut slot = self.records.lock().await;
        let records = self.loaded(&mut slot).await?;
        Ok(records
            .iter()
            .rev()
            .any(|r| matches_recent(r, recipient, category, cd, now)))
    }

    async fn record_sent(
        &self,
        recipient: RecipientId,
        category: EventCategory,
        payload: serde_json::Value,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        let rec = NotificationRecord {
            recipient,
            category,
            payload,
            sent_at,
        };
        let mut line = serde_json::to_string(&rec).context("encode notification record")?;
        line.push('\n');

        let mut slot = self.records.lock().await;
        let records = self.loaded(&mut slot).await?;
        self.append_line(&line).await?;
        records.push(rec);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn memory_log_respects_recipient_category_and_window() {
        let log = InMemoryNotificationLog::new();
        let r = RecipientId(7);
        log.record_sent(r, EventCategory::Rain, serde_json::json!({}), t0())
            .await
            .unwrap();

        let within = Duration::minutes(60);
        let later = t0() + Duration::minutes(30);
        assert!(log.was_recently_sent(r, EventCategory::Rain, within, later).await.unwrap());
        assert!(!log.was_recently_sent(r, EventCategory::Wind, within, later).await.unwrap());
        assert!(!log
            .was_recently_sent(RecipientId(8), EventCategory::Rain, within, later)
            .await
            .unwrap());
        let expired = t0() + Duration::minutes(61);
        assert!(!log.was_recently_sent(r, EventCategory::Rain, within, expired).await.unwrap());
    }

    #[tokio::test]
    async fn jsonl_log_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("notifications.jsonl");
        let log = JsonlNotificationLog::new(&path);

        let r = RecipientId(42);
        let within = Duration::minutes(60);
        assert!(!log.was_recently_sent(r, EventCategory::Pressure, within, t0()).await.unwrap());

        log.record_sent(
            r,
            EventCategory::Pressure,
            serde_json::json!({"type": "pressure_drop"}),
            t0(),
        )
        .await
        .unwrap();
        log.record_sent(r, EventCategory::Rain, serde_json::json!({}), t0())
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        // a fresh handle on the same file sees the earlier writes
        let reopened = JsonlNotificationLog::new(&path);
        let soon = t0() + Duration::minutes(10);
        assert!(reopened
            .was_recently_sent(r, EventCategory::Pressure, within, soon)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn jsonl_log_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.jsonl");
        std::fs::write(&path, "not json\n\n").unwrap();
        let log = JsonlNotificationLog::new(&path);
        log.record_sent(RecipientId(1), EventCategory::Wind, serde_json::json!({}), t0())
            .await
            .unwrap();
        assert!(log
            .was_recently_sent(RecipientId(1), EventCategory::Wind, Duration::minutes(60), t0())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn jsonl_log_reads_the_file_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.jsonl");
        let log = JsonlNotificationLog::new(&path);
        let r = RecipientId(3);
        log.record_sent(r, EventCategory::Temperature, serde_json::json!({}), t0())
            .await
            .unwrap();

        // later checks are served from memory, not by re-parsing the file
        std::fs::write(&path, "").unwrap();
        let within = Duration::minutes(60);
        let soon = t0() + Duration::minutes(5);
        assert!(log
            .was_recently_sent(r, EventCategory::Temperature, within, soon)
            .await
            .unwrap());
        assert!(!JsonlNotificationLog::new(&path)
            .was_recently_sent(r, EventCategory::Temperature, within, soon)
            .await
            .unwrap());
    }
}
