//! Notification protocol for Arsip.
//!
//! This crate defines what travels on the notification stream:
//!
//! - **Types** ([`Channel`], [`Notification`], [`ConnectionStatus`],
//!   [`SidebarCounts`]): the logical events subscribers receive.
//! - **Codec** ([`SseDecoder`], [`SseEvent`]): how raw server-sent-events
//!   bytes are cut into frames.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the stream
//! client (subscribers). It knows nothing about HTTP, sessions, or
//! reconnection:
//!
//! ```text
//! Transport (bytes) → Protocol (SseEvent → Notification) → Stream (subscribers)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{SseDecoder, SseEvent};
pub use error::ProtocolError;
pub use types::{
    Channel, ConnectionStatus, ErrorNotice, Notification, SidebarCounts,
};
