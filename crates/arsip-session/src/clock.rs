//! The session clock: when did this client last log in or refresh.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{SessionError, SessionStore, TokenConfig, TokenStatus, compute_status};

/// Storage key holding the last login or refresh time, in epoch
/// milliseconds as a decimal string.
pub const LAST_LOGIN_KEY: &str = "lastLoginTime";

/// Current wall-clock time in epoch milliseconds.
///
/// A system clock set before 1970 reads as zero.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Records and reads the session timestamp in a [`SessionStore`].
///
/// Cheap to clone; all clones share the same store.
#[derive(Clone)]
pub struct SessionClock {
    store: Arc<dyn SessionStore>,
}

impl SessionClock {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Stores `now_ms` as the last login time.
    pub fn record_login(&self, now_ms: u64) -> Result<(), SessionError> {
        self.store.set(LAST_LOGIN_KEY, &now_ms.to_string())?;
        tracing::debug!(login_time = now_ms, "session clock recorded");
        Ok(())
    }

    /// Records the current time. Called after every successful refresh.
    pub fn touch(&self) -> Result<(), SessionError> {
        self.record_login(now_millis())
    }

    /// The stored timestamp, if any.
    ///
    /// A value that does not parse as an integer is treated as absent.
    pub fn login_timestamp(&self) -> Result<Option<u64>, SessionError> {
        let Some(raw) = self.store.get(LAST_LOGIN_KEY)? else {
            return Ok(None);
        };
        match raw.trim().parse::<u64>() {
            Ok(ms) => Ok(Some(ms)),
            Err(e) => {
                tracing::warn!(
                    value = %raw,
                    error = %e,
                    "unparsable session timestamp, treating as logged out"
                );
                Ok(None)
            }
        }
    }

    /// Removes the timestamp. The session reads as logged out afterwards.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.store.remove(LAST_LOGIN_KEY)?;
        tracing::debug!("session clock cleared");
        Ok(())
    }

    /// Token status at the current time.
    pub fn status(&self, config: &TokenConfig) -> Result<TokenStatus, SessionError> {
        self.status_at(now_millis(), config)
    }

    /// Token status at `now_ms`.
    pub fn status_at(
        &self,
        now_ms: u64,
        config: &TokenConfig,
    ) -> Result<TokenStatus, SessionError> {
        Ok(compute_status(self.login_timestamp()?, now_ms, config))
    }
}

impl std::fmt::Debug for SessionClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClock").finish_non_exhaustive()
    }
}
