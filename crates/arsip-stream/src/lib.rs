//! Real-time notification stream for Arsip.
//!
//! [`NotificationClient`] keeps one server-push connection open for the
//! lifetime of the application and fans incoming events out to
//! subscribers by [`Channel`](arsip_protocol::Channel).
//!
//! # Reconnect policy
//!
//! When the connection drops (read error, server closed it, or the
//! heartbeat finds the transport closed), the client:
//!
//! 1. publishes `error: {message}`,
//! 2. if it still has attempts left, publishes
//!    `connection: {status: "reconnecting", attempt}` and refreshes the
//!    access token through the shared `RefreshCoordinator`,
//! 3. waits and reopens, or gives up with `failed` /
//!    `authentication_failed`.
//!
//! | Refresh outcome | Next step |
//! |---|---|
//! | refreshed | wait `reconnect_delay`, reopen |
//! | rejected | publish `authentication_failed`, wait `auth_redirect_delay`, redirect to login, stop |
//! | unreachable | wait `reconnect_delay * attempt`, reopen |
//!
//! A successful open resets the attempt counter.

mod client;
mod config;
mod error;
mod registry;

pub use client::NotificationClient;
pub use config::{StreamConfig, StreamState};
pub use error::StreamError;
pub use registry::{Callback, SubscriberId, SubscriberRegistry, Subscription};
