//! `SessionCoordinator`: one of everything, wired together.
//!
//! The refresh lock is only useful if every caller shares it, so the
//! coordinator builds exactly one [`RefreshCoordinator`] and hands it to
//! both the API client and the notification stream.

use std::sync::Arc;

use arsip_session::{
    AuthorizedClient, KeepAlive, LoginRedirect, Navigator, OnRejected, RefreshCoordinator,
    RefreshOutcome, SessionClock, SessionError, SessionStore, TokenStatus,
};
use arsip_stream::NotificationClient;
use arsip_transport::{HttpTransport, Transport};

use crate::{ArsipConfig, ArsipError};

/// Owns the session core for the lifetime of the application.
///
/// # Example
///
/// ```rust,ignore
/// let config = ArsipConfig::from_env()?;
/// let session = SessionCoordinator::http(
///     config,
///     Arc::new(FileStore::new("session.json")),
///     Arc::new(LogNavigator),
/// )?;
/// session.record_login()?;
/// let _keepalive = session.spawn_keepalive();
/// session.notifications().connect();
/// ```
pub struct SessionCoordinator<T: Transport> {
    config: ArsipConfig,
    refresh: Arc<RefreshCoordinator<T>>,
    client: AuthorizedClient<T>,
    notifications: NotificationClient<T>,
}

impl<T: Transport> SessionCoordinator<T> {
    pub fn new(
        config: ArsipConfig,
        transport: Arc<T>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let clock = SessionClock::new(store);
        let redirect = LoginRedirect::new(&config.base_path, navigator);
        let refresh = Arc::new(RefreshCoordinator::new(transport, clock, redirect));
        let client = AuthorizedClient::new(Arc::clone(&refresh));
        let notifications = NotificationClient::new(Arc::clone(&refresh), config.stream.clone());

        tracing::info!(
            api_url = %config.api_url,
            login = %refresh.redirect().target(),
            "session coordinator ready"
        );

        Self {
            config,
            refresh,
            client,
            notifications,
        }
    }

    pub fn config(&self) -> &ArsipConfig {
        &self.config
    }

    /// The API client for uploads and JSON calls.
    pub fn client(&self) -> &AuthorizedClient<T> {
        &self.client
    }

    pub fn notifications(&self) -> &NotificationClient<T> {
        &self.notifications
    }

    pub fn refresh_coordinator(&self) -> &Arc<RefreshCoordinator<T>> {
        &self.refresh
    }

    pub fn clock(&self) -> &SessionClock {
        self.refresh.clock()
    }

    /// Starts the session clock. Call after the login flow succeeds.
    pub fn record_login(&self) -> Result<(), SessionError> {
        self.refresh.start_session()?;
        tracing::info!("login recorded");
        Ok(())
    }

    /// Ends the session locally: closes the stream and clears the clock.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.notifications.close();
        self.clock().clear()?;
        tracing::info!("logged out");
        Ok(())
    }

    pub fn token_status(&self) -> Result<TokenStatus, SessionError> {
        self.clock().status(&self.config.token)
    }

    /// Refreshes now, sharing any refresh already in flight.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        self.refresh.refresh(OnRejected::RedirectNow).await
    }

    /// Starts the periodic token check. Keep the handle; dropping it
    /// stops the check.
    pub fn spawn_keepalive(&self) -> KeepAlive {
        KeepAlive::spawn(
            Arc::clone(&self.refresh),
            self.config.token.clone(),
            self.config.debug_mode,
        )
    }
}

impl SessionCoordinator<HttpTransport> {
    /// Builds a coordinator over the real HTTP transport.
    pub fn http(
        config: ArsipConfig,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ArsipError> {
        let transport = Arc::new(HttpTransport::new(&config.api_url)?);
        Ok(Self::new(config, transport, store, navigator))
    }

    /// The underlying HTTP transport, e.g. to seed its cookie jar.
    pub fn transport(&self) -> &Arc<HttpTransport> {
        self.refresh.transport()
    }
}

impl<T: Transport> std::fmt::Debug for SessionCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("config", &self.config)
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}
