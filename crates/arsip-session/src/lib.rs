//! Client-side session management for Arsip.
//!
//! This crate keeps a browser-style session alive from the client side:
//!
//! 1. **Session clock**: when did we last log in or refresh
//!    ([`SessionClock`] over a [`SessionStore`])
//! 2. **Token status**: is the access token fresh, due for refresh, or
//!    expired ([`compute_status`])
//! 3. **Single-flight refresh**: at most one refresh call in flight, every
//!    concurrent caller shares its outcome ([`RefreshCoordinator`])
//! 4. **Authorized calls**: uploads and JSON requests that refresh once
//!    on 401 and replay ([`AuthorizedClient`])
//! 5. **Keepalive**: a periodic check that refreshes before expiry
//!    ([`KeepAlive`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Stream Layer (above)     ← reconnects through the same RefreshCoordinator
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Transport Layer (below)  ← refresh / send / upload over HTTP
//! ```

mod client;
mod clock;
mod config;
mod error;
mod keepalive;
mod progress;
mod redirect;
mod refresh;
mod status;
mod store;

pub use client::AuthorizedClient;
pub use clock::{LAST_LOGIN_KEY, SessionClock, now_millis};
pub use config::TokenConfig;
pub use error::SessionError;
pub use keepalive::{KeepAlive, KeepAliveAction, check_session};
pub use progress::ProgressTracker;
pub use redirect::{LogNavigator, LoginRedirect, Navigator};
pub use refresh::{
    OnRejected, RefreshCoordinator, RefreshOutcome, refresh_access_token,
};
pub use status::{TokenStatus, TokenTimes, compute_status};
pub use store::{FileStore, MemoryStore, SessionStore};
