//! Navigation to the login page once a session cannot be saved.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Something that can send the user to another page.
///
/// A browser host implements this by changing the location; a CLI or a
/// service might exit, or prompt for credentials again.
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, target: &str);
}

/// Default navigator: there is no page to go to, so it just says so.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, target: &str) {
        tracing::warn!(target, "session ended, login required");
    }
}

/// The login redirect: a fixed target plus the navigator that goes there.
///
/// Several paths can end the same session at almost the same moment (a
/// rejected refresh, an upload that joined it, the stream's delayed
/// redirect). Only the first [`redirect`](Self::redirect) navigates;
/// the rest are no-ops until [`rearm`](Self::rearm) marks a new session.
/// Clones share this state.
#[derive(Clone)]
pub struct LoginRedirect {
    target: String,
    navigator: Arc<dyn Navigator>,
    sent: Arc<AtomicBool>,
}

impl LoginRedirect {
    /// Targets `{base_path}/login`. A trailing `/` on `base_path` is dropped.
    pub fn new(base_path: &str, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            target: format!("{}/login", base_path.trim_end_matches('/')),
            navigator,
            sent: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Sends the user to the login page, once per session.
    pub fn redirect(&self) {
        if self.sent.swap(true, Ordering::AcqRel) {
            tracing::debug!(target = %self.target, "login redirect already sent");
            return;
        }
        tracing::info!(target = %self.target, "redirecting to login");
        self.navigator.navigate(&self.target);
    }

    /// Allows the next [`redirect`](Self::redirect) to navigate again.
    /// Called when a session starts or is refreshed.
    pub fn rearm(&self) {
        self.sent.store(false, Ordering::Release);
    }

    /// `true` once the current session has been redirected.
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LoginRedirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRedirect")
            .field("target", &self.target)
            .field("sent", &self.is_sent())
            .finish_non_exhaustive()
    }
}
