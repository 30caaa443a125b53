//! # Arsip
//!
//! Client-side session core for the Arsip document management front end.
//!
//! The backend issues short-lived access tokens as cookies. This crate
//! keeps a session alive from the client side: it tracks token age,
//! refreshes once (never concurrently) when a call comes back 401, replays
//! the call, and keeps a live notification stream open across token
//! expiry.
//!
//! ## Layers
//!
//! ```text
//! arsip (this crate)  ← config from the environment, SessionCoordinator
//!   ├── arsip-stream     ← NotificationClient, subscriber registry
//!   ├── arsip-session    ← session clock, single-flight refresh, AuthorizedClient
//!   ├── arsip-transport  ← Transport / EventSource traits, HttpTransport
//!   └── arsip-protocol   ← channels, payloads, SSE frame decoder
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use arsip::prelude::*;
//!
//! # async fn run() -> Result<(), ArsipError> {
//! let config = ArsipConfig::from_env()?;
//! init_tracing(config.debug_mode);
//!
//! let session = SessionCoordinator::http(
//!     config,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(LogNavigator),
//! )?;
//! session.record_login()?;
//! let _keepalive = session.spawn_keepalive();
//!
//! let _sidebar = session.notifications().subscribe(Channel::Sidebar, |n| {
//!     if let Ok(counts) = n.decode::<SidebarCounts>() {
//!         println!("{} unread", counts.unread_count);
//!     }
//! });
//! session.notifications().connect();
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod error;
mod telemetry;

pub use config::{
    ArsipConfig, ConfigError, ENV_ACCESS_TOKEN_DURATION, ENV_API_URL, ENV_BASE_PATH,
    ENV_DEBUG_MODE, ENV_REFRESH_CHECK_INTERVAL, ENV_REFRESH_THRESHOLD,
};
pub use coordinator::SessionCoordinator;
pub use error::ArsipError;
pub use telemetry::init_tracing;

pub use arsip_protocol as protocol;
pub use arsip_session as session;
pub use arsip_stream as stream;
pub use arsip_transport as transport;

/// Everything an application typically needs, in one import.
pub mod prelude {
    pub use crate::{ArsipConfig, ArsipError, ConfigError, SessionCoordinator, init_tracing};
    pub use arsip_protocol::{
        Channel, ConnectionStatus, ErrorNotice, Notification, SidebarCounts,
    };
    pub use arsip_session::{
        AuthorizedClient, FileStore, KeepAlive, LogNavigator, MemoryStore, Navigator,
        ProgressTracker, RefreshOutcome, SessionError, SessionStore, TokenConfig,
        TokenStatus,
    };
    pub use arsip_stream::{
        NotificationClient, StreamConfig, StreamError, StreamState, Subscription,
    };
    pub use arsip_transport::{ApiRequest, HttpTransport, Transport, UploadFile};
}
