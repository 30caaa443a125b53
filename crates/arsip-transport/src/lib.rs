//! Transport abstraction layer for Arsip.
//!
//! Provides the [`Transport`] and [`EventSource`] traits that abstract over
//! how the client reaches the backend, so the session and stream layers can
//! be driven by the real HTTP client in production and by scripted mocks
//! in tests.
//!
//! # Feature Flags
//!
//! - `http` (default): HTTP and server-sent-events transport via `reqwest`

mod error;
#[cfg(feature = "http")]
mod http;
mod types;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::{HttpEventSource, HttpTransport};
pub use types::{
    ApiRequest, ByteProgress, HttpResponse, Method, ResponseMeta,
    UploadFile, UploadRequest,
};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use arsip_protocol::SseEvent;

/// Everything the client needs from the backend.
///
/// Implementations must treat credentials as ambient: no method takes a
/// token, the transport attaches whatever its credential mechanism holds
/// (cookies for [`HttpTransport`]).
///
/// Methods return `impl Future + Send` so callers can drive them from
/// spawned Tokio tasks. Implementors may still write `async fn`.
pub trait Transport: Send + Sync + 'static {
    /// The live event stream produced by [`open_events`](Self::open_events).
    type Events: EventSource;

    /// `POST /auths/refresh`. Error statuses are returned in the
    /// [`ResponseMeta`]; only network failures are `Err`.
    fn refresh(
        &self,
    ) -> impl Future<Output = Result<ResponseMeta, TransportError>> + Send;

    /// Sends a JSON request to an API endpoint.
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;

    /// Uploads one file as a multipart body with a single `file` field.
    ///
    /// `progress` is called with `(bytes_sent, bytes_total)` as the body
    /// is handed to the network.
    fn upload(
        &self,
        request: UploadRequest,
        progress: ByteProgress,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;

    /// Opens the notification event stream.
    fn open_events(
        &self,
    ) -> impl Future<Output = Result<Self::Events, TransportError>> + Send;
}

/// A single live server-push connection.
pub trait EventSource: Send + 'static {
    /// Waits for the next complete event.
    ///
    /// Returns `Ok(None)` when the server ends the stream cleanly.
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<SseEvent>, TransportError>> + Send;

    /// A shared view of this connection's [`ReadyState`].
    ///
    /// The cell stays valid after the source is dropped, which lets a
    /// watchdog poll it while another future holds `&mut self`.
    fn ready_state(&self) -> ReadyStateCell;
}

// ---------------------------------------------------------------------------
// ReadyState
// ---------------------------------------------------------------------------

/// Connection state as reported by the transport itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

impl ReadyState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closed => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Shared, cloneable holder of a [`ReadyState`].
#[derive(Debug, Clone)]
pub struct ReadyStateCell(Arc<AtomicU8>);

impl ReadyStateCell {
    /// Creates a cell holding `state`.
    pub fn new(state: ReadyState) -> Self {
        Self(Arc::new(AtomicU8::new(state.as_u8())))
    }

    /// Current state.
    pub fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Replaces the state. Visible to every clone.
    pub fn set(&self, state: ReadyState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}
