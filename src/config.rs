//! Service configuration read from the environment.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::fetcher::{HttpSourceConfig, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::poller::{PollerConfig, DEFAULT_POLL_INTERVAL_MS};

pub const ENDPOINT_VAR: &str = "LEADPULSE_ENDPOINT";
pub const LEGACY_ENDPOINT_VAR: &str = "PRIVATE_API_ENDPOINT";
pub const ADDR_VAR: &str = "LEADPULSE_ADDR";
pub const POLL_INTERVAL_VAR: &str = "LEADPULSE_POLL_INTERVAL_MS";
pub const REQUEST_TIMEOUT_VAR: &str = "LEADPULSE_REQUEST_TIMEOUT_MS";
pub const SKIP_WHEN_IN_FLIGHT_VAR: &str = "LEADPULSE_SKIP_WHEN_IN_FLIGHT";
pub const NGROK_SKIP_WARNING_VAR: &str = "LEADPULSE_NGROK_SKIP_WARNING";

const DEFAULT_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub bind_addr: SocketAddr,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub skip_when_in_flight: bool,
    pub ngrok_skip_browser_warning: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("analytics endpoint missing: set LEADPULSE_ENDPOINT or PRIVATE_API_ENDPOINT")]
    MissingEndpoint,
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
    #[error("{var} must be greater than zero")]
    ZeroDuration { var: &'static str },
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so callers and tests do
    /// not have to mutate the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = [ENDPOINT_VAR, LEGACY_ENDPOINT_VAR]
            .into_iter()
            .filter_map(|var| lookup(var))
            .map(|raw| raw.trim().to_string())
            .find(|raw| !raw.is_empty())
            .ok_or(ConfigError::MissingEndpoint)?;

        let bind_addr = match non_empty(lookup(ADDR_VAR)) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                var: ADDR_VAR,
                value: raw,
            })?,
            None => SocketAddr::from(DEFAULT_ADDR),
        };

        Ok(Self {
            endpoint,
            bind_addr,
            poll_interval_ms: parse_millis(&lookup, POLL_INTERVAL_VAR, DEFAULT_POLL_INTERVAL_MS)?,
            request_timeout_ms: parse_millis(
                &lookup,
                REQUEST_TIMEOUT_VAR,
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?,
            skip_when_in_flight: parse_flag(&lookup, SKIP_WHEN_IN_FLIGHT_VAR, false)?,
            ngrok_skip_browser_warning: parse_flag(&lookup, NGROK_SKIP_WARNING_VAR, true)?,
        })
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            skip_when_in_flight: self.skip_when_in_flight,
        }
    }

    pub fn http_source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            endpoint: self.endpoint.clone(),
            timeout_ms: self.request_timeout_ms,
            ngrok_skip_browser_warning: self.ngrok_skip_browser_warning,
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = non_empty(lookup(var)) else {
        return Ok(default);
    };

    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::ZeroDuration { var }),
        Ok(value) => Ok(value),
        Err(_) => Err(ConfigError::InvalidValue { var, value: raw }),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = non_empty(lookup(var)) else {
        return Ok(default);
    };

    parse_bool(&raw).ok_or(ConfigError::InvalidValue { var, value: raw })
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}
