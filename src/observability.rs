//! Logging configuration, subscriber setup and service lifecycle events.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{parse_bool, ServiceConfig};

pub const LOG_LEVEL_VAR: &str = "LEADPULSE_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "LEADPULSE_LOG_FORMAT";
pub const LOG_TARGET_VAR: &str = "LEADPULSE_LOG_TARGET";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    LoggingConfig::from_lookup(|key| env::var(key).ok())
}

impl LoggingConfig {
    /// Unparsable format or target values keep their defaults instead of
    /// failing startup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            level: lookup(LOG_LEVEL_VAR)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
                .unwrap_or(defaults.level),
            format: lookup(LOG_FORMAT_VAR)
                .and_then(|raw| LogFormat::parse(&raw))
                .unwrap_or(defaults.format),
            include_target: lookup(LOG_TARGET_VAR)
                .and_then(|raw| parse_bool(&raw))
                .unwrap_or(defaults.include_target),
        }
    }
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(logging: &LoggingConfig, service: &ServiceConfig) {
    info!(
        component = "dashboard_server",
        event = "app.start",
        log_level = %logging.level,
        log_format = ?logging.format,
        bind_addr = %service.bind_addr,
        poll_interval_ms = service.poll_interval_ms,
        request_timeout_ms = service.request_timeout_ms,
        skip_when_in_flight = service.skip_when_in_flight
    );
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    info!(
        component = "dashboard_server",
        event = "app.bind",
        bind_addr = %bound_addr,
        routes = "/dashboard/state /dashboard/refresh /api/analytics"
    );
}

/// Only the host is logged: webhook paths tend to embed access tokens.
pub fn log_upstream_configured(config: &ServiceConfig) {
    let host = upstream_host(&config.endpoint).unwrap_or_else(|| "<unparsable>".to_string());
    info!(
        component = "dashboard_server",
        event = "upstream.configured",
        upstream_host = %host,
        ngrok_skip_browser_warning = config.ngrok_skip_browser_warning
    );
}

pub fn log_app_shutdown() {
    info!(component = "dashboard_server", event = "app.shutdown");
}

fn upstream_host(endpoint: &str) -> Option<String> {
    reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(LoggingConfig::from_lookup(lookup(&[])), LoggingConfig::default());
    }

    #[test]
    fn parses_json_and_level_and_target() {
        let cfg = LoggingConfig::from_lookup(lookup(&[
            (LOG_LEVEL_VAR, "leadpulse=debug"),
            (LOG_FORMAT_VAR, "JSON"),
            (LOG_TARGET_VAR, "off"),
        ]));

        assert_eq!(cfg.level, "leadpulse=debug");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);
    }

    #[test]
    fn invalid_format_or_target_falls_back_to_defaults() {
        let cfg = LoggingConfig::from_lookup(lookup(&[
            (LOG_LEVEL_VAR, "  "),
            (LOG_FORMAT_VAR, "logfmt"),
            (LOG_TARGET_VAR, "sometimes"),
        ]));

        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn upstream_host_drops_path_and_query() {
        assert_eq!(
            upstream_host("https://hooks.example.dev/webhook/secret-token?x=1").as_deref(),
            Some("hooks.example.dev")
        );
        assert_eq!(upstream_host("not a url"), None);
    }
}
