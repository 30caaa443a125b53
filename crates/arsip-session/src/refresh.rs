//! Token refresh: the single call, and the coordinator that makes sure
//! only one of them is ever in flight.
//!
//! # Single flight
//!
//! Several callers can discover an expired token at the same moment: two
//! uploads hitting 401 together, or the stream reconnecting while the
//! keepalive fires. Without coordination each of them would call the
//! refresh endpoint, and since a refresh rotates the refresh cookie, all
//! but the first would fail and log the user out.
//!
//! [`RefreshCoordinator::refresh`] elects the first caller as **leader**.
//! Everyone arriving while the leader's call is pending becomes a
//! **follower**: it parks on a oneshot receiver and is released, in
//! arrival order, with the exact outcome the leader saw.
//!
//! ```text
//! caller A ──refresh()──► leader ──POST /auths/refresh──► outcome
//! caller B ──refresh()──► follower ─┐                        │
//! caller C ──refresh()──► follower ─┤◄── released in order ──┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arsip_transport::{ResponseMeta, Transport, TransportError};
use tokio::sync::oneshot;

use crate::{LoginRedirect, SessionClock, SessionError};

/// Issues one refresh call.
///
/// HTTP error statuses come back inside the [`ResponseMeta`]; only a
/// failure to reach the server is an `Err`.
pub async fn refresh_access_token<T: Transport>(
    transport: &T,
) -> Result<ResponseMeta, TransportError> {
    let meta = transport.refresh().await?;
    tracing::debug!(status = meta.status, "token refresh responded");
    Ok(meta)
}

/// What a refresh achieved, as seen by every caller that waited for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens were issued; the session clock has been updated.
    Refreshed,
    /// The server refused to refresh. The session clock has been cleared.
    Rejected { status: u16 },
    /// The refresh endpoint could not be reached. Nothing was changed.
    Unreachable { reason: String },
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed)
    }
}

/// Who performs the login redirect when a refresh is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnRejected {
    /// The leader redirects as soon as the rejection is known.
    RedirectNow,
    /// The caller redirects when it is ready (after publishing its own
    /// status, for instance).
    Defer,
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    followers: Vec<oneshot::Sender<RefreshOutcome>>,
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Settles the refresh for every follower, even if the leader's future
/// is dropped before its call completes.
struct LeaderGuard<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(&mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        let followers = {
            let mut state = lock(self.state);
            state.in_flight = false;
            std::mem::take(&mut state.followers)
        };
        if !followers.is_empty() {
            tracing::debug!(
                followers = followers.len(),
                ?outcome,
                "releasing refresh followers"
            );
        }
        for follower in followers {
            // A follower that stopped waiting is fine to skip.
            let _ = follower.send(outcome.clone());
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("refresh leader cancelled, releasing followers");
            self.settle(&RefreshOutcome::Unreachable {
                reason: "refresh cancelled".to_string(),
            });
        }
    }
}

/// Serializes token refreshes across every client sharing it.
///
/// Create one per application and share it behind an `Arc`.
pub struct RefreshCoordinator<T: Transport> {
    transport: Arc<T>,
    clock: SessionClock,
    redirect: LoginRedirect,
    state: Mutex<RefreshState>,
}

impl<T: Transport> RefreshCoordinator<T> {
    pub fn new(transport: Arc<T>, clock: SessionClock, redirect: LoginRedirect) -> Self {
        Self {
            transport,
            clock,
            redirect,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Refreshes the access token, or waits for the refresh already in
    /// flight.
    ///
    /// The leader applies the outcome before anyone is released: on
    /// success it records the session clock, on rejection it clears it
    /// (and redirects if `on_rejected` is [`OnRejected::RedirectNow`]).
    pub async fn refresh(&self, on_rejected: OnRejected) -> RefreshOutcome {
        let role = {
            let mut state = lock(&self.state);
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.followers.push(tx);
                Role::Follower(rx)
            } else {
                state.in_flight = true;
                Role::Leader
            }
        };

        match role {
            Role::Follower(rx) => {
                tracing::debug!("refresh in flight, waiting for its outcome");
                rx.await.unwrap_or_else(|_| RefreshOutcome::Unreachable {
                    reason: "refresh leader went away".to_string(),
                })
            }
            Role::Leader => {
                let mut guard = LeaderGuard {
                    state: &self.state,
                    settled: false,
                };
                let outcome = self.run(on_rejected).await;
                guard.settle(&outcome);
                outcome
            }
        }
    }

    async fn run(&self, on_rejected: OnRejected) -> RefreshOutcome {
        match refresh_access_token(&*self.transport).await {
            Ok(meta) if meta.is_success() => {
                if let Err(e) = self.clock.touch() {
                    tracing::error!(error = %e, "failed to record refreshed session");
                }
                self.redirect.rearm();
                tracing::info!("access token refreshed");
                RefreshOutcome::Refreshed
            }
            Ok(meta) => {
                tracing::warn!(status = meta.status, "token refresh rejected");
                self.clear_clock();
                if on_rejected == OnRejected::RedirectNow {
                    self.redirect.redirect();
                }
                RefreshOutcome::Rejected {
                    status: meta.status,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh unreachable");
                RefreshOutcome::Unreachable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Starts a session after login: records the clock and allows the
    /// next login redirect.
    pub fn start_session(&self) -> Result<(), SessionError> {
        self.clock.touch()?;
        self.redirect.rearm();
        Ok(())
    }

    /// Ends the session locally: clears the clock and redirects to login.
    /// Redirects at most once per session, however many callers end it.
    pub fn expire_session(&self) {
        self.clear_clock();
        self.redirect.redirect();
    }

    fn clear_clock(&self) {
        if let Err(e) = self.clock.clear() {
            tracing::error!(error = %e, "failed to clear session clock");
        }
    }

    /// `true` while a leader's refresh call is pending.
    pub fn is_refreshing(&self) -> bool {
        lock(&self.state).in_flight
    }

    /// Callers currently parked behind the leader.
    pub fn pending_followers(&self) -> usize {
        lock(&self.state).followers.len()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn redirect(&self) -> &LoginRedirect {
        &self.redirect
    }
}
