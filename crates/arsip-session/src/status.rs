//! Token status: pure arithmetic over the session clock.
//!
//! The access token itself is an opaque cookie; the client never sees
//! its expiry. What it does know is when it last logged in or refreshed,
//! and how long tokens live. Everything here is derived from those two
//! numbers and the current time. No I/O, no side effects.

use std::fmt;
use std::time::Duration;

use crate::TokenConfig;

/// Derived timings of a logged-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTimes {
    /// Time since login or last refresh.
    pub token_age: Duration,
    /// `token_age > access_token_duration`.
    pub is_expired: bool,
    /// `token_age > access_token_duration * refresh_threshold`.
    pub needs_refresh: bool,
    /// Remaining lifetime, zero once expired.
    pub time_until_expiry: Duration,
    /// Time until a refresh becomes due, zero once due.
    pub time_until_refresh: Duration,
}

/// The session as seen from the client.
///
/// "Not logged in" is its own state rather than an age of zero, so a
/// missing timestamp can never look like a brand-new token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    NotLoggedIn,
    Active(TokenTimes),
}

impl TokenStatus {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// `true` only for an active session past its lifetime.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Active(t) if t.is_expired)
    }

    /// `true` only for an active session past the refresh threshold.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, Self::Active(t) if t.needs_refresh)
    }

    pub fn times(&self) -> Option<&TokenTimes> {
        match self {
            Self::Active(t) => Some(t),
            Self::NotLoggedIn => None,
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoggedIn => write!(f, "not logged in"),
            Self::Active(t) => write!(
                f,
                "age {}s, expires in {}s, refresh in {}s{}{}",
                t.token_age.as_secs(),
                t.time_until_expiry.as_secs(),
                t.time_until_refresh.as_secs(),
                if t.needs_refresh { ", refresh due" } else { "" },
                if t.is_expired { ", expired" } else { "" },
            ),
        }
    }
}

/// Computes the token status at `now_ms` (epoch milliseconds).
///
/// A login timestamp in the future (clock skew) counts as age zero.
pub fn compute_status(
    login_timestamp: Option<u64>,
    now_ms: u64,
    config: &TokenConfig,
) -> TokenStatus {
    let Some(login_ms) = login_timestamp else {
        return TokenStatus::NotLoggedIn;
    };

    let age_ms = now_ms.saturating_sub(login_ms);
    let lifetime_ms = config.access_token_millis();
    let refresh_ms = config.refresh_after_millis();

    TokenStatus::Active(TokenTimes {
        token_age: Duration::from_millis(age_ms),
        is_expired: age_ms > lifetime_ms,
        needs_refresh: age_ms > refresh_ms,
        time_until_expiry: Duration::from_millis(
            lifetime_ms.saturating_sub(age_ms),
        ),
        time_until_refresh: Duration::from_millis(
            refresh_ms.saturating_sub(age_ms),
        ),
    })
}
