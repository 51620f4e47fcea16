// src/source.rs
//! Where bucketed samples come from. Parsing station telemetry and storing
//! the time series happen elsewhere; this only fetches a closed window.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

use crate::model::WeatherSample;

#[async_trait::async_trait]
pub trait SampleSource: Send + Sync {
    /// Samples with `from <= time <= to`.
    async fn fetch(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<WeatherSample>>;
    fn name(&self) -> &'static str;
}

/// Station API: `GET {base}/api/weather/history?from=..&to=..&interval=5m`.
#[derive(Clone)]
pub struct HttpSampleSource {
    base_url: String,
    interval: String,
    client: Client,
}

impl HttpSampleSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            interval: "5m".to_string(),
            client: Client::new(),
        }
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Result<Self> {
        self.client = Client::builder()
            .timeout(Duration::from_secs(secs))
            .build()
            .context("build http client")?;
        Ok(self)
    }

    fn history_url(&self) -> String {
        format!("{}/api/weather/history", self.base_url)
    }
}

#[async_trait::async_trait]
impl SampleSource for HttpSampleSource {
    async fn fetch(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<WeatherSample>> {
        let from_s = from.to_rfc3339_opts(SecondsFormat::Secs, true);
        let to_s = to.to_rfc3339_opts(SecondsFormat::Secs, true);
        let resp = self
            .client
            .get(self.history_url())
            .query(&[
                ("from", from_s.as_str()),
                ("to", to_s.as_str()),
                ("interval", self.interval.as_str()),
            ])
            .send()
            .await
            .context("fetch weather history")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("weather history returned {status}: {}", body.trim());
        }

        let samples: Vec<WeatherSample> = resp
            .json()
            .await
            .context("decode weather history JSON")?;
        tracing::debug!(target: "source", count = samples.len(), "fetched samples");
        Ok(samples)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Fixed in-memory series; used by the demo binary and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSampleSource {
    samples: Vec<WeatherSample>,
}

impl StaticSampleSource {
    pub fn new(samples: Vec<WeatherSample>) -> Self {
        Self { samples }
    }

    /// Load a JSON array of samples (same shape as the history endpoint).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading samples from {}", path.display()))?;
        let samples: Vec<WeatherSample> = serde_json::from_str(&content)
            .with_context(|| format!("parsing samples from {}", path.display()))?;
        Ok(Self::new(samples))
    }

    pub fn samples(&self) -> &[WeatherSample] {
        &self.samples
    }
}

#[async_trait::async_trait]
impl SampleSource for StaticSampleSource {
    async fn fetch(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<WeatherSample>> {
        Ok(self
            .samples
            .iter()
            .filter(|s| s.time >= from && s.time <= to)
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn static_source_filters_inclusive_range() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let src = StaticSampleSource::new(
            (0..6)
                .map(|i| WeatherSample::at(t0 + Duration::minutes(5 * i)))
                .collect(),
        );
        let got = src
            .fetch(t0 + Duration::minutes(5), t0 + Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(got.len(), 3);
    }

    #[test]
    fn json_file_loads_station_shape() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("window.json");
        std::fs::write(
            &p,
            r#"[{"time":"2025-06-01T10:00:00Z","rain_rate":0.4,"wind_gust":3.1},
                {"time":"2025-06-01T10:05:00Z"}]"#,
        )
        .unwrap();
        let src = StaticSampleSource::from_json_file(&p).unwrap();
        assert_eq!(src.samples().len(), 2);
        assert_eq!(src.samples()[0].rain_rate, Some(0.4));
        assert_eq!(src.samples()[1].rain_rate, None);
    }

    #[test]
    fn history_url_strips_trailing_slash() {
        let s = HttpSampleSource::new("http://localhost:8080/");
        assert_eq!(s.history_url(), "http://localhost:8080/api/weather/history");
    }
}
