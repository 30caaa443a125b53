//! Error types for the stream layer.

/// Why the notification client stopped reconnecting on its own.
///
/// Recorded when the client enters [`StreamState::Failed`](crate::StreamState::Failed)
/// and available through `NotificationClient::last_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Every automatic reconnect attempt failed.
    #[error("notification stream gave up after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },

    /// The token refresh was rejected while reconnecting. The user has
    /// been (or is about to be) sent to the login page.
    #[error("notification stream authentication failed")]
    AuthenticationFailed,
}
