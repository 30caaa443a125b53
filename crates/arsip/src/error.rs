//! Unified error type for Arsip.

use arsip_protocol::ProtocolError;
use arsip_session::SessionError;
use arsip_stream::StreamError;
use arsip_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps every crate-specific error.
///
/// Applications using the `arsip` crate handle this one type; `?`
/// converts sub-crate errors through the `#[from]` impls.
#[derive(Debug, thiserror::Error)]
pub enum ArsipError {
    /// Environment configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Network failure, bad URL, or a refused stream.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A notification frame or payload that could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session expired, call rejected, or storage failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The notification stream gave up.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Missing {
            key: "NEXT_PUBLIC_API_URL",
        };
        let arsip_err: ArsipError = err.into();
        assert!(matches!(arsip_err, ArsipError::Config(_)));
        assert!(arsip_err.to_string().contains("NEXT_PUBLIC_API_URL"));
    }

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::InvalidUrl("nope".into());
        let arsip_err: ArsipError = err.into();
        assert!(matches!(arsip_err, ArsipError::Transport(_)));
        assert!(arsip_err.to_string().contains("nope"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidFrame("bad".into());
        let arsip_err: ArsipError = err.into();
        assert!(matches!(arsip_err, ArsipError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let arsip_err: ArsipError = SessionError::SessionExpired.into();
        assert!(matches!(arsip_err, ArsipError::Session(_)));
        assert_eq!(arsip_err.to_string(), "session expired, please log in again");
    }

    #[test]
    fn test_from_stream_error() {
        let arsip_err: ArsipError = StreamError::ReconnectExhausted { attempts: 5 }.into();
        assert!(matches!(arsip_err, ArsipError::Stream(_)));
    }
}
