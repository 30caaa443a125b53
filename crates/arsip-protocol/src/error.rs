//! Error types for the protocol layer.
//!
//! Each crate in Arsip defines its own error enum. A `ProtocolError`
//! always means the bytes arrived fine but their content could not be
//! understood; it never signals a network problem.

/// Errors that can occur while decoding notification events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// An event's `data` field is not valid JSON, or does not have the
    /// shape the caller asked for.
    ///
    /// The stream client logs and drops these; they never tear down the
    /// connection or reach other subscribers.
    #[error("malformed payload on channel {channel}: {source}")]
    MalformedPayload {
        channel: String,
        #[source]
        source: serde_json::Error,
    },

    /// A frame violates the event-stream format in a way the decoder
    /// cannot recover from.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
