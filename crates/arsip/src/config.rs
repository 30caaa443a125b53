//! Application configuration, loaded once at startup.

use std::time::Duration;

use arsip_session::TokenConfig;
use arsip_stream::StreamConfig;

/// Backend base URL, e.g. `https://arsip.example.go.id/api`. Required.
pub const ENV_API_URL: &str = "NEXT_PUBLIC_API_URL";
/// Access token lifetime in minutes. Default 60.
pub const ENV_ACCESS_TOKEN_DURATION: &str = "NEXT_PUBLIC_ACCESS_TOKEN_DURATION";
/// Keepalive check period in minutes. Default 5.
pub const ENV_REFRESH_CHECK_INTERVAL: &str = "NEXT_PUBLIC_REFRESH_CHECK_INTERVAL";
/// Fraction of the lifetime after which to refresh. Default 0.8.
pub const ENV_REFRESH_THRESHOLD: &str = "NEXT_PUBLIC_REFRESH_THRESHOLD";
/// `true` or `1` enables token status logging.
pub const ENV_DEBUG_MODE: &str = "NEXT_PUBLIC_DEBUG_MODE";
/// Path prefix the application is served under. Default empty.
pub const ENV_BASE_PATH: &str = "NEXT_PUBLIC_BASE_PATH";

/// Errors while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {key}")]
    Missing { key: &'static str },

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the session core needs to know about its environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ArsipConfig {
    /// Base URL every endpoint is appended to. No trailing `/`.
    pub api_url: String,
    /// Prefix for the login page: the redirect goes to `{base_path}/login`.
    pub base_path: String,
    /// Log the token status on every keepalive check.
    pub debug_mode: bool,
    pub token: TokenConfig,
    pub stream: StreamConfig,
}

impl ArsipConfig {
    /// A config for `api_url` with every other setting at its default.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            base_path: String::new(),
            debug_mode: false,
            token: TokenConfig::default(),
            stream: StreamConfig::default(),
        }
    }

    /// Reads the `NEXT_PUBLIC_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. An empty value counts as unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = get(ENV_API_URL).ok_or(ConfigError::Missing { key: ENV_API_URL })?;
        let mut config = Self::new(api_url);

        if let Some(minutes) = get(ENV_ACCESS_TOKEN_DURATION) {
            config.token.access_token_duration =
                minutes_setting(ENV_ACCESS_TOKEN_DURATION, &minutes)?;
        }
        if let Some(minutes) = get(ENV_REFRESH_CHECK_INTERVAL) {
            config.token.refresh_check_interval =
                minutes_setting(ENV_REFRESH_CHECK_INTERVAL, &minutes)?;
        }
        if let Some(raw) = get(ENV_REFRESH_THRESHOLD) {
            config.token.refresh_threshold =
                raw.parse::<f64>().map_err(|e| ConfigError::Invalid {
                    key: ENV_REFRESH_THRESHOLD,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
        }
        config.token = config.token.validated();

        config.debug_mode = get(ENV_DEBUG_MODE)
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        if let Some(base_path) = get(ENV_BASE_PATH) {
            config.base_path = base_path.trim_end_matches('/').to_string();
        }

        tracing::debug!(
            api_url = %config.api_url,
            base_path = %config.base_path,
            debug_mode = config.debug_mode,
            access_token_secs = config.token.access_token_duration.as_secs(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn with_token_config(mut self, token: TokenConfig) -> Self {
        self.token = token.validated();
        self
    }

    pub fn with_stream_config(mut self, stream: StreamConfig) -> Self {
        self.stream = stream.validated();
        self
    }
}

fn minutes_setting(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let minutes: u64 = raw.parse().map_err(|e: std::num::ParseIntError| {
        ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(Duration::from_secs(minutes.saturating_mul(60)))
}
