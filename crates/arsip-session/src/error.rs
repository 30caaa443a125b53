//! Error types for the session layer.

use arsip_transport::TransportError;

/// Errors surfaced to callers of the session layer.
///
/// HTTP 401 never escapes as its own variant: it either triggers the
/// refresh-and-retry cycle or, when that cycle cannot save the session,
/// becomes [`SessionError::SessionExpired`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Re-authentication failed. Local session state has been cleared
    /// and the login redirect fired; the user must log in again.
    #[error("session expired, please log in again")]
    SessionExpired,

    /// The server rejected an upload for a reason other than auth.
    /// `message` is the server's `responseDesc` when it sent one.
    #[error("upload failed ({status}): {message}")]
    UploadFailed { status: u16, message: String },

    /// The server rejected a JSON API call for a reason other than auth.
    #[error("request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    /// The refresh call failed before the server answered. As with
    /// [`SessionExpired`](Self::SessionExpired), local session state has
    /// been cleared and the login redirect fired; the reason is kept for
    /// display.
    #[error("token refresh unreachable: {0}")]
    RefreshUnreachable(String),

    /// A network-level failure on the call itself.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reading or writing the session store failed.
    #[error("session storage failed: {0}")]
    Storage(String),

    /// A 2xx response whose body is not the JSON we expected.
    #[error("response decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
