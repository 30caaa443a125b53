//! Periodic token check that refreshes before the access token expires.

use std::sync::Arc;

use arsip_transport::Transport;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{OnRejected, RefreshCoordinator, TokenConfig, TokenStatus};

/// What one keepalive check decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveAction {
    /// Not logged in, or the token is still fresh.
    Idle,
    /// The refresh threshold has passed.
    Refresh,
    /// The token is already past its lifetime; the session is ended.
    Expire,
}

impl KeepAliveAction {
    pub fn decide(status: &TokenStatus) -> Self {
        if status.is_expired() {
            Self::Expire
        } else if status.needs_refresh() {
            Self::Refresh
        } else {
            Self::Idle
        }
    }
}

/// Runs one check against the session clock and acts on it.
pub async fn check_session<T: Transport>(
    coordinator: &RefreshCoordinator<T>,
    config: &TokenConfig,
    debug: bool,
) -> KeepAliveAction {
    let status = match coordinator.clock().status(config) {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(error = %e, "keepalive could not read session clock");
            return KeepAliveAction::Idle;
        }
    };
    if debug {
        tracing::debug!(%status, "token status");
    }

    let action = KeepAliveAction::decide(&status);
    match action {
        KeepAliveAction::Idle => {}
        KeepAliveAction::Refresh => {
            tracing::info!("refresh threshold passed, refreshing proactively");
            let outcome = coordinator.refresh(OnRejected::RedirectNow).await;
            tracing::debug!(?outcome, "proactive refresh finished");
        }
        KeepAliveAction::Expire => {
            tracing::warn!("access token expired, ending session");
            coordinator.expire_session();
        }
    }
    action
}

/// Handle to the background keepalive task. Dropping it stops the task.
#[derive(Debug)]
pub struct KeepAlive {
    handle: JoinHandle<()>,
}

impl KeepAlive {
    /// Spawns the task. The first check runs immediately, then once per
    /// `config.refresh_check_interval`.
    pub fn spawn<T: Transport>(
        coordinator: Arc<RefreshCoordinator<T>>,
        config: TokenConfig,
        debug: bool,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.refresh_check_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::debug!(
                interval_secs = config.refresh_check_interval.as_secs(),
                "keepalive started"
            );
            loop {
                interval.tick().await;
                check_session(&coordinator, &config, debug).await;
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
