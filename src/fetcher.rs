//! Single bounded-duration fetch of the upstream analytics payload.
//!
//! `fetch_analytics` never fails outward: every failure resolves to the
//! fallback view model with the cause reported alongside it.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL, PRAGMA};
use thiserror::Error;
use tracing::{info, warn};

use crate::analytics::{fallback_view_model, transform, DashboardViewModel, RawAnalyticsRecord};

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8_000;

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("analytics transport error: {0}")]
    Transport(String),
    #[error("analytics endpoint returned HTTP status {0}")]
    Status(u16),
    #[error("analytics request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("analytics payload could not be decoded: {0}")]
    Decode(String),
    #[error("failed to build analytics HTTP client: {0}")]
    ClientBuild(String),
}

/// Where the upstream payload comes from. Implementations return the JSON body
/// untouched; decoding and fallback handling live in this module.
pub trait AnalyticsSource: Send + Sync + 'static {
    fn fetch_raw(&self) -> SourceFuture<'_, serde_json::Value>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSourceConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub ngrok_skip_browser_warning: bool,
}

impl HttpSourceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            ngrok_skip_browser_warning: true,
        }
    }
}

pub struct HttpAnalyticsSource {
    client: reqwest::Client,
    endpoint: String,
    timeout_ms: u64,
}

impl HttpAnalyticsSource {
    pub fn new(cfg: &HttpSourceConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        if cfg.ngrok_skip_browser_warning {
            headers.insert("ngrok-skip-browser-warning", HeaderValue::from_static("true"));
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|err| FetchError::ClientBuild(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            timeout_ms: cfg.timeout_ms,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl AnalyticsSource for HttpAnalyticsSource {
    fn fetch_raw(&self) -> SourceFuture<'_, serde_json::Value> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.endpoint)
                .send()
                .await
                .map_err(|err| self.request_error(err))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let body = response
                .bytes()
                .await
                .map_err(|err| self.request_error(err))?;
            serde_json::from_slice(&body).map_err(|err| FetchError::Decode(err.to_string()))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub view: DashboardViewModel,
    pub error: Option<FetchError>,
}

impl FetchOutcome {
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

pub async fn fetch_analytics(source: &dyn AnalyticsSource, timeout: Duration) -> FetchOutcome {
    match fetch_records(source, timeout).await {
        Ok(records) => {
            let record_count = records.as_ref().map_or(0, Vec::len);
            if record_count == 0 {
                info!(component = "fetcher", event = "fetch.empty");
            } else {
                info!(component = "fetcher", event = "fetch.ok", record_count);
            }

            FetchOutcome {
                view: transform(records.as_deref()),
                error: None,
            }
        }
        Err(err) => {
            warn!(
                component = "fetcher",
                event = "fetch.fallback",
                error = %err
            );

            FetchOutcome {
                view: fallback_view_model(),
                error: Some(err),
            }
        }
    }
}

pub async fn fetch_records(
    source: &dyn AnalyticsSource,
    timeout: Duration,
) -> Result<Option<Vec<RawAnalyticsRecord>>, FetchError> {
    decode_records(fetch_raw_bounded(source, timeout).await?)
}

/// The source future is dropped, and with it the in-flight request, once
/// `timeout` elapses.
pub async fn fetch_raw_bounded(
    source: &dyn AnalyticsSource,
    timeout: Duration,
) -> Result<serde_json::Value, FetchError> {
    tokio::time::timeout(timeout, source.fetch_raw())
        .await
        .map_err(|_| FetchError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })?
}

pub fn decode_records(
    value: serde_json::Value,
) -> Result<Option<Vec<RawAnalyticsRecord>>, FetchError> {
    serde_json::from_value(value).map_err(|err| FetchError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fallback_daily_metrics;
    use serde_json::json;

    enum FakeSource {
        Body(serde_json::Value),
        Fail(FetchError),
        Hang(Duration),
    }

    impl AnalyticsSource for FakeSource {
        fn fetch_raw(&self) -> SourceFuture<'_, serde_json::Value> {
            Box::pin(async move {
                match self {
                    FakeSource::Body(value) => Ok(value.clone()),
                    FakeSource::Fail(err) => Err(err.clone()),
                    FakeSource::Hang(delay) => {
                        tokio::time::sleep(*delay).await;
                        Ok(json!([]))
                    }
                }
            })
        }
    }

    fn record_json(total: u64) -> serde_json::Value {
        json!({
            "total_conversations": total,
            "hot_leads": { "total": 4, "percentage": "10%" },
            "platform_distribution": {
                "messenger": { "count": 30, "appointments": 5, "conversion_rate": "17%" },
                "instagram": { "count": 10, "appointments": 2, "conversion_rate": "20%" },
                "other": { "count": 0, "percentage": "0%" }
            },
            "lead_distribution": {
                "grade_a": { "count": 4, "percentage": "10%", "range": "80-100" },
                "grade_b": { "count": 6 },
                "grade_c": { "count": 10 },
                "grade_d": { "count": 20 }
            },
            "average_response_time_minutes": "1.25",
            "average_response_time_formatted": "1m 15s",
            "response_time_data_points": 12,
            "timestamp": "2025-11-07T10:00:00Z"
        })
    }

    const TIMEOUT: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn successful_fetch_transforms_first_record() {
        let source = FakeSource::Body(json!([record_json(40)]));
        let outcome = fetch_analytics(&source, TIMEOUT).await;

        assert!(!outcome.is_fallback());
        assert_eq!(outcome.view.total_conversations, 40);
        assert_eq!(outcome.view.appointments_booked, 7);
        assert_eq!(outcome.view.avg_response_time, "1m 15s");
        assert_eq!(outcome.view.daily_metrics, fallback_daily_metrics());
    }

    #[tokio::test]
    async fn null_or_empty_body_is_fallback_without_error() {
        for body in [json!(null), json!([])] {
            let outcome = fetch_analytics(&FakeSource::Body(body), TIMEOUT).await;
            assert_eq!(outcome.view, fallback_view_model());
            assert!(outcome.error.is_none());
        }
    }

    #[tokio::test]
    async fn malformed_shape_resolves_to_fallback() {
        let mut broken = record_json(40);
        broken["lead_distribution"] = json!("not an object");

        for body in [json!({ "total_conversations": 1 }), json!([broken])] {
            let outcome = fetch_analytics(&FakeSource::Body(body), TIMEOUT).await;
            assert_eq!(outcome.view, fallback_view_model());
            assert!(matches!(outcome.error, Some(FetchError::Decode(_))));
        }
    }

    #[tokio::test]
    async fn transport_and_status_failures_resolve_to_fallback() {
        for err in [
            FetchError::Transport("connection reset".to_string()),
            FetchError::Status(502),
        ] {
            let outcome = fetch_analytics(&FakeSource::Fail(err.clone()), TIMEOUT).await;
            assert_eq!(outcome.view, fallback_view_model());
            assert_eq!(outcome.error, Some(err));
        }
    }

    #[tokio::test]
    async fn slow_source_is_cut_off_at_timeout() {
        let source = FakeSource::Hang(Duration::from_secs(30));
        let started = std::time::Instant::now();
        let outcome = fetch_analytics(&source, Duration::from_millis(50)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.view, fallback_view_model());
        assert_eq!(outcome.error, Some(FetchError::Timeout { timeout_ms: 50 }));
    }

    #[test]
    fn http_source_config_defaults_to_eight_second_timeout() {
        let cfg = HttpSourceConfig::new("http://127.0.0.1:9/analytics");
        assert_eq!(cfg.timeout_ms, 8_000);
        assert!(cfg.ngrok_skip_browser_warning);
    }
}
