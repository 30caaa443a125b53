//! API calls that survive an expired access token.
//!
//! Every call runs the same bounded loop:
//!
//! ```text
//! attempt 1 ──200──► done
//!     │
//!    401 ──► RefreshCoordinator::refresh
//!               ├─ Refreshed ──► attempt 2 ──200──► done
//!               │                    └─401──► expire session
//!               ├─ Rejected ────► expire session, SessionExpired
//!               └─ Unreachable ─► expire session, RefreshUnreachable
//! ```
//!
//! There is never a third attempt. Every caller that fails here ends the
//! session itself, whether it led the refresh or joined one led by the
//! stream; the redirect still happens only once.

use std::sync::Arc;

use arsip_transport::{ApiRequest, HttpResponse, Transport, UploadFile, UploadRequest};
use serde_json::Value;

use crate::{OnRejected, ProgressTracker, RefreshCoordinator, RefreshOutcome, SessionError};

const MAX_ATTEMPTS: u32 = 2;

/// Which kind of call failed, for the error it maps to.
#[derive(Debug, Clone, Copy)]
enum CallKind {
    Upload,
    Request,
}

enum Step {
    Done(Value),
    Retry,
}

/// Uploads and JSON calls with refresh-on-401 and a single replay.
pub struct AuthorizedClient<T: Transport> {
    coordinator: Arc<RefreshCoordinator<T>>,
}

impl<T: Transport> Clone for AuthorizedClient<T> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

impl<T: Transport> AuthorizedClient<T> {
    pub fn new(coordinator: Arc<RefreshCoordinator<T>>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator<T>> {
        &self.coordinator
    }

    /// Uploads `file` as multipart field `file` to `{API_URL}{endpoint}`
    /// and returns the decoded JSON response.
    ///
    /// `progress` keeps reporting across the replay without going
    /// backwards, and reports 100 on success.
    pub async fn upload(
        &self,
        endpoint: impl Into<String>,
        file: UploadFile,
        progress: ProgressTracker,
    ) -> Result<Value, SessionError> {
        let request = UploadRequest::new(endpoint, file);
        tracing::debug!(
            endpoint = %request.endpoint,
            file_name = %request.file.file_name,
            size = request.file.len(),
            "uploading file"
        );

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .coordinator
                .transport()
                .upload(request.clone(), progress.as_byte_progress())
                .await?;
            match self.evaluate(response, attempt, CallKind::Upload).await? {
                Step::Done(value) => {
                    progress.finish();
                    return Ok(value);
                }
                Step::Retry => continue,
            }
        }
        // `evaluate` never asks to retry the last attempt.
        Err(self.expire())
    }

    /// Sends a JSON request to `{API_URL}{endpoint}` and returns the
    /// decoded JSON response.
    pub async fn send_json(&self, request: ApiRequest) -> Result<Value, SessionError> {
        tracing::debug!(
            method = %request.method,
            endpoint = %request.endpoint,
            "sending request"
        );

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self.coordinator.transport().send(request.clone()).await?;
            match self.evaluate(response, attempt, CallKind::Request).await? {
                Step::Done(value) => return Ok(value),
                Step::Retry => continue,
            }
        }
        Err(self.expire())
    }

    async fn evaluate(
        &self,
        response: HttpResponse,
        attempt: u32,
        kind: CallKind,
    ) -> Result<Step, SessionError> {
        let meta = response.meta();

        if meta.is_success() {
            return response.json().map(Step::Done).map_err(SessionError::Decode);
        }

        if !meta.is_unauthorized() {
            let message = response_message(&response, kind);
            tracing::warn!(status = meta.status, %message, ?kind, "call failed");
            return Err(match kind {
                CallKind::Upload => SessionError::UploadFailed {
                    status: meta.status,
                    message,
                },
                CallKind::Request => SessionError::RequestFailed {
                    status: meta.status,
                    message,
                },
            });
        }

        if attempt >= MAX_ATTEMPTS {
            tracing::warn!(attempt, "still unauthorized after refresh");
            return Err(self.expire());
        }

        tracing::info!(attempt, "unauthorized, refreshing access token");
        match self.coordinator.refresh(OnRejected::RedirectNow).await {
            RefreshOutcome::Refreshed => Ok(Step::Retry),
            RefreshOutcome::Rejected { .. } => Err(self.expire()),
            RefreshOutcome::Unreachable { reason } => {
                tracing::warn!(%reason, "refresh failed, ending session");
                self.coordinator.expire_session();
                Err(SessionError::RefreshUnreachable(reason))
            }
        }
    }

    fn expire(&self) -> SessionError {
        self.coordinator.expire_session();
        SessionError::SessionExpired
    }
}

/// The server's `responseDesc`, or a generic message.
fn response_message(response: &HttpResponse, kind: CallKind) -> String {
    response
        .json::<Value>()
        .ok()
        .and_then(|body| {
            body.get("responseDesc")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| match kind {
            CallKind::Upload => "Upload failed".to_string(),
            CallKind::Request => "Request failed".to_string(),
        })
}
