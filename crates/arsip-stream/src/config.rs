//! Stream client configuration and connection state.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// StreamConfig
// ---------------------------------------------------------------------------

/// Timing and retry settings for [`NotificationClient`](crate::NotificationClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// How often the connection task checks that the transport is still
    /// open. A check that finds it closed counts as a disconnect.
    pub heartbeat_interval: Duration,

    /// Automatic reconnects allowed before giving up. Reset to zero by
    /// every successful open.
    pub max_reconnect_attempts: u32,

    /// Pause before reconnecting after a successful refresh. When the
    /// refresh could not reach the server, attempt `n` waits `n` times
    /// this long.
    pub reconnect_delay: Duration,

    /// Pause between announcing an authentication failure and redirecting
    /// to login, so subscribers can show a message first.
    pub auth_redirect_delay: Duration,

    /// Pause between closing and reopening in a manual reconnect.
    pub manual_reconnect_delay: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(3),
            auth_redirect_delay: Duration::from_secs(2),
            manual_reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl StreamConfig {
    /// Replace values that would break the connection task.
    ///
    /// A zero heartbeat interval would make `tokio::time::interval` panic;
    /// it is replaced by the default. Everything else is accepted as-is,
    /// including zero delays and zero reconnect attempts.
    pub fn validated(mut self) -> Self {
        if self.heartbeat_interval.is_zero() {
            tracing::warn!("heartbeat_interval is zero, using default");
            self.heartbeat_interval = Self::default().heartbeat_interval;
        }
        self
    }

    /// Backoff before reconnect attempt `attempt` when the refresh endpoint
    /// was unreachable: `reconnect_delay * attempt`.
    pub fn unreachable_backoff(&self, attempt: u32) -> Duration {
        self.reconnect_delay.saturating_mul(attempt.max(1))
    }
}

// ---------------------------------------------------------------------------
// StreamState
// ---------------------------------------------------------------------------

/// Lifecycle of the notification client.
///
/// ```text
///            connect()
/// Idle ───────────────► Connecting ──open──► Open
///                          ▲                   │ error / end / heartbeat
///                          │                   ▼
///                          └──── Reconnecting { attempt } ──► Failed
///
/// close() from any state ──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created, never connected.
    Idle,
    /// Opening the transport.
    Connecting,
    /// Receiving events.
    Open,
    /// Waiting to reopen after a disconnect.
    Reconnecting { attempt: u32 },
    /// Closed by the caller.
    Closed,
    /// Gave up; see `NotificationClient::last_error`.
    Failed,
}

impl StreamState {
    /// `true` while a connection task is working on this client.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Open | Self::Reconnecting { .. }
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting ({attempt})"),
            Self::Closed => write!(f, "closed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
