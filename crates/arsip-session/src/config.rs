//! Token timing configuration.

use std::time::Duration;

/// How long access tokens live and when to refresh them.
///
/// Loaded once at startup and never mutated afterwards; cloned into each
/// component that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenConfig {
    /// Lifetime of an access token, measured from login or last refresh.
    pub access_token_duration: Duration,
    /// Fraction (0.0–1.0) of the lifetime after which a proactive refresh
    /// is due. Default: 0.8.
    pub refresh_threshold: f64,
    /// How often the keepalive task checks the token status.
    pub refresh_check_interval: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_duration: Duration::from_secs(60 * 60),
            refresh_threshold: 0.8,
            refresh_check_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl TokenConfig {
    /// Builds a config from minute values, as they appear in the
    /// environment.
    pub fn from_minutes(access_token_minutes: u64, check_minutes: u64) -> Self {
        Self {
            access_token_duration: Duration::from_secs(access_token_minutes.saturating_mul(60)),
            refresh_check_interval: Duration::from_secs(check_minutes.saturating_mul(60)),
            ..Default::default()
        }
        .validated()
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// - `refresh_threshold` clamped to `0.0..=1.0` (NaN becomes the default).
    /// - A zero `access_token_duration` or `refresh_check_interval` is
    ///   replaced by its default.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.refresh_threshold.is_nan() {
            tracing::warn!("refresh_threshold is NaN, using default");
            self.refresh_threshold = defaults.refresh_threshold;
        }
        if !(0.0..=1.0).contains(&self.refresh_threshold) {
            tracing::warn!(
                threshold = self.refresh_threshold,
                "refresh_threshold outside 0.0..=1.0, clamping"
            );
            self.refresh_threshold = self.refresh_threshold.clamp(0.0, 1.0);
        }
        if self.access_token_duration.is_zero() {
            tracing::warn!("access_token_duration is zero, using default");
            self.access_token_duration = defaults.access_token_duration;
        }
        if self.refresh_check_interval.is_zero() {
            tracing::warn!("refresh_check_interval is zero, using default");
            self.refresh_check_interval = defaults.refresh_check_interval;
        }
        self
    }

    /// Token lifetime in whole milliseconds, saturating at `u64::MAX`.
    pub fn access_token_millis(&self) -> u64 {
        u64::try_from(self.access_token_duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Token age, in whole milliseconds, past which a refresh is due.
    pub fn refresh_after_millis(&self) -> u64 {
        (self.access_token_millis() as f64 * self.refresh_threshold).round()
            as u64
    }
}
