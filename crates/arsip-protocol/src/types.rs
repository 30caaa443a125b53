//! Core notification types.
//!
//! The server pushes *named* events; the name picks a logical channel and
//! the `data` field carries a JSON payload. Everything a subscriber sees is
//! a [`Notification`]: a channel plus its decoded JSON.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{ProtocolError, SseEvent};

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A logical event channel on the notification stream.
///
/// The four well-known channels get their own variants so that matching
/// on them is checked by the compiler. Anything else the server sends is
/// kept verbatim in [`Channel::Custom`] so subscribers can still listen
/// for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Header badge updates.
    Header,
    /// Sidebar counters (see [`SidebarCounts`]).
    Sidebar,
    /// Stream errors published by the client itself.
    Error,
    /// Connection lifecycle (see [`ConnectionStatus`]).
    Connection,
    /// Any other event name.
    Custom(String),
}

impl Channel {
    /// Name used by SSE frames that carry no `event:` field.
    pub const DEFAULT_EVENT: &'static str = "message";

    /// Maps an SSE event name to a channel.
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "header" => Self::Header,
            "sidebar" => Self::Sidebar,
            "error" => Self::Error,
            "connection" => Self::Connection,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The wire name of this channel.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Header => "header",
            Self::Sidebar => "sidebar",
            Self::Error => "error",
            Self::Connection => "connection",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::from_event_name(name)
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// One event delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Which channel the event belongs to.
    pub channel: Channel,
    /// The decoded JSON payload.
    pub payload: serde_json::Value,
}

impl Notification {
    /// Creates a notification from an already-decoded payload.
    pub fn new(channel: Channel, payload: serde_json::Value) -> Self {
        Self { channel, payload }
    }

    /// Decodes a raw SSE frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedPayload`] if `data` is not JSON.
    pub fn from_sse(event: &SseEvent) -> Result<Self, ProtocolError> {
        let channel = Channel::from_event_name(
            event.event.as_deref().unwrap_or(Channel::DEFAULT_EVENT),
        );
        let payload = serde_json::from_str(&event.data).map_err(|source| {
            ProtocolError::MalformedPayload {
                channel: channel.to_string(),
                source,
            }
        })?;
        Ok(Self { channel, payload })
    }

    /// Interprets the payload as a concrete type.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedPayload`] if the JSON does not
    /// match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.payload).map_err(|source| {
            ProtocolError::MalformedPayload {
                channel: self.channel.to_string(),
                source,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

/// Sidebar counters pushed on the `sidebar` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarCounts {
    /// Which menu entry the count belongs to.
    pub code_notif: i64,
    /// Number of unread items for that entry.
    pub unread_count: i64,
}

/// Payload of events the client publishes on the `error` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
}

impl ErrorNotice {
    /// Wraps this notice as an `error` channel notification.
    pub fn into_notification(self) -> Notification {
        Notification::new(Channel::Error, to_payload(&self))
    }
}

/// Connection lifecycle events published on the `connection` channel.
///
/// Serialized internally tagged, so `Reconnecting { attempt: 2 }` becomes
/// `{"status": "reconnecting", "attempt": 2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32 },
    Failed,
    AuthenticationFailed,
}

impl ConnectionStatus {
    /// Wraps this status as a `connection` channel notification.
    pub fn into_notification(self) -> Notification {
        Notification::new(Channel::Connection, to_payload(&self))
    }
}

/// Serializes a derived payload type. These never fail, so `Null` is
/// never produced.
fn to_payload<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_default()
}
