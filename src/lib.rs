//! Lead-analytics dashboard core.
//!
//! Current implemented scope:
//! - upstream payload to dashboard view model transform, with fixed fallback data
//! - bounded single fetch that always resolves to a usable view model
//! - fixed-period poller publishing loading/error/last-update state
//! - HTTP routes over the published state

mod analytics;
mod config;
mod fetcher;
mod observability;
mod poller;
mod server;

pub use analytics::{
    estimate_appointments, fallback_daily_metrics, fallback_view_model, format_response_time,
    parse_conversion_rate, placeholder_leads, transform, DailyMetric, DashboardViewModel, Grade,
    Lead, LeadBucket, Platform, PlatformData, PlatformStats, RawAnalyticsRecord, RawGradeBucket,
    RawHotLeads, RawLeadDistribution, RawPlatformBucket, RawPlatformDistribution,
};
pub use config::{ConfigError, ServiceConfig};
pub use fetcher::{
    decode_records, fetch_analytics, fetch_raw_bounded, fetch_records, AnalyticsSource,
    FetchError, FetchOutcome, HttpAnalyticsSource, HttpSourceConfig, SourceFuture,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use observability::{
    init_logging, log_app_bind, log_app_shutdown, log_app_start, log_upstream_configured,
    logging_config_from_env, LogFormat, LoggingConfig, LoggingInitError,
};
pub use poller::{
    DashboardState, PollPhase, Poller, PollerConfig, PollerError, DEFAULT_POLL_INTERVAL_MS,
};
pub use server::dashboard_router;
