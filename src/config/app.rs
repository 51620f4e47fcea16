// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use chrono::{Duration as ChronoDuration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{DetectionConfig, MAX_WINDOW_MINUTES};
use crate::notify::dispatch::DEFAULT_COOLDOWN_MINUTES;
use crate::notify::subscribers::SubscriptionEntry;
use crate::scheduler::SchedulerCfg;

pub const ENV_CONFIG_PATH: &str = "WEATHER_EVENTS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/weather_events.toml";

fn default_interval_secs() -> u64 {
    3600
}
fn default_lookback_minutes() -> i64 {
    60
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_cooldown_minutes() -> i64 {
    DEFAULT_COOLDOWN_MINUTES
}
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_bucket() -> String {
    "5m".to_string()
}
fn default_source_timeout_secs() -> u64 {
    20
}
fn default_max_retries() -> u8 {
    3
}
fn default_telegram_timeout_secs() -> u64 {
    5
}
fn default_log_path() -> PathBuf {
    PathBuf::from("state/notifications.jsonl")
}
fn default_metrics_listen() -> String {
    "0.0.0.0:9100".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: i64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            lookback_minutes: default_lookback_minutes(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            cooldown_minutes: default_cooldown_minutes(),
        }
    }
}

impl SchedulerSection {
    pub fn scheduler_cfg(&self) -> SchedulerCfg {
        SchedulerCfg {
            interval: Duration::from_secs(self.interval_secs),
            lookback: ChronoDuration::minutes(self.lookback_minutes),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }

    pub fn cooldown(&self) -> ChronoDuration {
        ChronoDuration::minutes(self.cooldown_minutes)
    }

    /// Bounds every value so the chrono/tokio conversions above cannot overflow.
    pub fn validate(&self) -> Result<()> {
        let max_secs = (MAX_WINDOW_MINUTES * 60) as u64;
        if !(1..=max_secs).contains(&self.interval_secs) {
            anyhow::bail!(
                "scheduler.interval_secs must be between 1 and {max_secs}, got {}",
                self.interval_secs
            );
        }
        if !(1..=max_secs).contains(&self.fetch_timeout_secs) {
            anyhow::bail!(
                "scheduler.fetch_timeout_secs must be between 1 and {max_secs}, got {}",
                self.fetch_timeout_secs
            );
        }
        if !(1..=MAX_WINDOW_MINUTES).contains(&self.lookback_minutes) {
            anyhow::bail!(
                "scheduler.lookback_minutes must be between 1 and {MAX_WINDOW_MINUTES}, got {}",
                self.lookback_minutes
            );
        }
        if !(0..=MAX_WINDOW_MINUTES).contains(&self.cooldown_minutes) {
            anyhow::bail!(
                "scheduler.cooldown_minutes must be between 0 and {MAX_WINDOW_MINUTES}, got {}",
                self.cooldown_minutes
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bucket size requested from the history endpoint.
    #[serde(default = "default_bucket")]
    pub interval: String,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            interval: default_bucket(),
            timeout_secs: default_source_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSection {
    /// Bot token. "ENV" means: read from TELEGRAM_TOKEN. Empty disables delivery.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    #[serde(default = "default_telegram_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            token: String::new(),
            max_retries: default_max_retries(),
            timeout_secs: default_telegram_timeout_secs(),
        }
    }
}

impl TelegramSection {
    pub fn enabled(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyLogSection {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
}

impl Default for NotifyLogSection {
    fn default() -> Self {
        Self {
            path: default_log_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSection {
    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            listen: default_metrics_listen(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationSection {
    /// Local offset from UTC, used only for message clock lines.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl StationSection {
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| anyhow!("utc_offset_minutes out of range: {}", self.utc_offset_minutes))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub notify_log: NotifyLogSection,
    #[serde(default)]
    pub metrics: MetricsSection,
    #[serde(default)]
    pub station: StationSection,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionEntry>,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parse config TOML")?;
        cfg.finish()?;
        Ok(cfg)
    }

    /// Load from an explicit path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("loading {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) $WEATHER_EVENTS_CONFIG
    /// 2) config/weather_events.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        let mut cfg = AppConfig::default();
        cfg.finish()?;
        Ok(cfg)
    }

    /// Env overrides, token resolution, validation.
    fn finish(&mut self) -> Result<()> {
        self.apply_env_overrides();

        if self.telegram.token.trim().eq_ignore_ascii_case("env") {
            self.telegram.token = std::env::var("TELEGRAM_TOKEN")
                .map_err(|_| anyhow!("Missing TELEGRAM_TOKEN env var"))?;
        }

        self.detection.validate()?;
        self.station.offset()?;
        self.scheduler.validate()
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u64>("SCHEDULER_INTERVAL_SECS") {
            self.scheduler.interval_secs = v;
        }
        if let Some(v) = env_parse::<i64>("NOTIFY_COOLDOWN_MINUTES") {
            self.scheduler.cooldown_minutes = v;
        }
        if let Ok(v) = std::env::var("WEATHER_API_URL") {
            if !v.trim().is_empty() {
                self.source.base_url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("TELEGRAM_TOKEN") {
            if !v.trim().is_empty() && !self.telegram.enabled() {
                self.telegram.token = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("METRICS_LISTEN") {
            if !v.trim().is_empty() {
                self.metrics.listen = v.trim().to_string();
            }
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecipientId, Subscription};

    #[serial_test::serial]
    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.detection, DetectionConfig::default());
        assert_eq!(cfg.scheduler.interval_secs, 3600);
        assert_eq!(cfg.scheduler.cooldown_minutes, 60);
        assert_eq!(cfg.source.interval, "5m");
        assert!(cfg.subscriptions.is_empty());
    }

    #[serial_test::serial]
    #[test]
    fn full_file_parses() {
        let toml = r#"
[detection]
rain_gap_minutes = 20
wind_gust_threshold = 12.5

[scheduler]
interval_secs = 300

[station]
utc_offset_minutes = 180

[[subscriptions]]
recipient = 1001
categories = ["rain", "wind"]

[[subscriptions]]
recipient = 1002
categories = ["all"]
"#;
        let cfg = AppConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.detection.rain_gap_minutes, 20);
        assert_eq!(cfg.detection.rain_min_duration_minutes, 15);
        assert_eq!(cfg.detection.wind_gust_threshold, 12.5);
        assert_eq!(cfg.scheduler.interval_secs, 300);
        assert_eq!(cfg.station.offset().unwrap().local_minus_utc(), 3 * 3600);
        assert_eq!(cfg.subscriptions.len(), 2);
        assert_eq!(cfg.subscriptions[0].recipient, RecipientId(1001));
        assert_eq!(cfg.subscriptions[1].categories, vec![Subscription::All]);
    }

    #[serial_test::serial]
    #[test]
    fn invalid_detection_is_rejected() {
        let err = AppConfig::from_toml_str("[detection]\ntrend_window_minutes = 0").unwrap_err();
        assert!(format!("{err:#}").contains("trend_window_minutes"));
    }

    #[serial_test::serial]
    #[test]
    fn oversized_scheduler_minutes_are_rejected() {
        for (key, value) in [
            ("cooldown_minutes", i64::MAX.to_string()),
            ("cooldown_minutes", "-1".to_string()),
            ("lookback_minutes", i64::MAX.to_string()),
            ("interval_secs", "604801".to_string()),
            ("fetch_timeout_secs", "0".to_string()),
        ] {
            let toml = format!("[scheduler]\n{key} = {value}\n");
            let err = AppConfig::from_toml_str(&toml).unwrap_err();
            assert!(format!("{err:#}").contains(key), "{key}={value}: {err:#}");
        }
    }

    #[serial_test::serial]
    #[test]
    fn oversized_detection_window_is_rejected() {
        let toml = format!("[detection]\npressure_window_minutes = {}", i64::MAX);
        let err = AppConfig::from_toml_str(&toml).unwrap_err();
        assert!(format!("{err:#}").contains("pressure_window_minutes"));
    }
}
