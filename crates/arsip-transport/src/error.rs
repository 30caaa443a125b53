use arsip_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
///
/// Only network-level failures end up here. An HTTP response with an
/// error status is still a successful round trip and is returned to the
/// caller as a status code, never as a `TransportError`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client failed (DNS, TLS, connection reset, timeout).
    #[cfg(feature = "http")]
    #[error("http request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// A connection could not be made or was lost.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The configured API URL cannot be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The server answered the event-stream request with a non-2xx status.
    #[error("event stream refused with status {status}")]
    Rejected { status: u16 },

    /// The event stream delivered bytes the decoder could not frame.
    #[error(transparent)]
    Frame(#[from] ProtocolError),
}
