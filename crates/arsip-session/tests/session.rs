//! Integration tests for refresh coordination and the authorized client,
//! driven by a scripted in-memory API.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arsip_protocol::SseEvent;
use arsip_session::{
    AuthorizedClient, KeepAlive, KeepAliveAction, LoginRedirect, MemoryStore, Navigator,
    OnRejected, ProgressTracker, RefreshCoordinator, RefreshOutcome, SessionClock,
    SessionError, TokenConfig, check_session, now_millis,
};
use arsip_transport::{
    ApiRequest, ByteProgress, EventSource, HttpResponse, ReadyState, ReadyStateCell,
    ResponseMeta, Transport, TransportError, UploadRequest,
};
use futures_util::future::join_all;
use serde_json::json;

const MINUTE_MS: u64 = 60 * 1000;

// =========================================================================
// Scripted API: 401 until a refresh succeeds, then 200.
// =========================================================================

struct ScriptedApi {
    authorized: AtomicBool,
    /// Keep answering 401 even after a successful refresh.
    always_unauthorized: AtomicBool,
    refresh_status: AtomicU16,
    refresh_unreachable: AtomicBool,
    refresh_delay: Duration,
    /// Status and body returned instead of the normal flow.
    fixed_response: Mutex<Option<HttpResponse>>,
    refresh_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    send_calls: AtomicUsize,
}

impl ScriptedApi {
    fn new(refresh_delay: Duration) -> Self {
        Self {
            authorized: AtomicBool::new(false),
            always_unauthorized: AtomicBool::new(false),
            refresh_status: AtomicU16::new(200),
            refresh_unreachable: AtomicBool::new(false),
            refresh_delay,
            fixed_response: Mutex::new(None),
            refresh_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
        }
    }

    fn respond(&self) -> HttpResponse {
        if let Some(fixed) = self.fixed_response.lock().unwrap().clone() {
            return fixed;
        }
        if self.authorized.load(Ordering::SeqCst)
            && !self.always_unauthorized.load(Ordering::SeqCst)
        {
            HttpResponse::new(200, r#"{"responseCode":"200","data":{"id":7}}"#)
        } else {
            HttpResponse::new(401, r#"{"responseDesc":"Unauthorized"}"#)
        }
    }
}

struct NoEvents(ReadyStateCell);

impl EventSource for NoEvents {
    async fn next_event(&mut self) -> Result<Option<SseEvent>, TransportError> {
        Ok(None)
    }

    fn ready_state(&self) -> ReadyStateCell {
        self.0.clone()
    }
}

impl Transport for ScriptedApi {
    type Events = NoEvents;

    async fn refresh(&self) -> Result<ResponseMeta, TransportError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.refresh_delay).await;
        if self.refresh_unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("connection refused".into()));
        }
        let status = self.refresh_status.load(Ordering::SeqCst);
        if (200..300).contains(&status) {
            self.authorized.store(true, Ordering::SeqCst);
        }
        Ok(ResponseMeta { status })
    }

    async fn send(&self, _request: ApiRequest) -> Result<HttpResponse, TransportError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.respond())
    }

    async fn upload(
        &self,
        request: UploadRequest,
        progress: ByteProgress,
    ) -> Result<HttpResponse, TransportError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let total = request.file.len();
        progress(total / 2, total);
        progress(total, total);
        Ok(self.respond())
    }

    async fn open_events(&self) -> Result<NoEvents, TransportError> {
        Ok(NoEvents(ReadyStateCell::new(ReadyState::Closed)))
    }
}

#[derive(Default)]
struct RecordingNavigator(Mutex<Vec<String>>);

impl RecordingNavigator {
    fn visits(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.0.lock().unwrap().push(target.to_string());
    }
}

struct Harness {
    api: Arc<ScriptedApi>,
    clock: SessionClock,
    navigator: Arc<RecordingNavigator>,
    coordinator: Arc<RefreshCoordinator<ScriptedApi>>,
    client: AuthorizedClient<ScriptedApi>,
}

fn harness(refresh_delay: Duration) -> Harness {
    let api = Arc::new(ScriptedApi::new(refresh_delay));
    let clock = SessionClock::new(Arc::new(MemoryStore::new()));
    let navigator = Arc::new(RecordingNavigator::default());
    let redirect = LoginRedirect::new("", navigator.clone());
    let coordinator = Arc::new(RefreshCoordinator::new(
        api.clone(),
        clock.clone(),
        redirect,
    ));
    let client = AuthorizedClient::new(coordinator.clone());
    Harness {
        api,
        clock,
        navigator,
        coordinator,
        client,
    }
}

fn pdf() -> arsip_transport::UploadFile {
    arsip_transport::UploadFile::new("surat.pdf", vec![0u8; 4096])
        .with_content_type("application/pdf")
}

// =========================================================================
// Single-flight refresh
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_upload_concurrent_unauthorized_single_refresh() {
    let h = harness(Duration::from_millis(200));
    h.clock.record_login(now_millis() - 50 * MINUTE_MS).unwrap();

    let uploads = (0..5).map(|i| {
        h.client
            .upload(format!("/surat/{i}/lampiran"), pdf(), ProgressTracker::silent())
    });
    let results = join_all(uploads).await;

    assert!(results.iter().all(|r| r.is_ok()), "{results:?}");
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.api.upload_calls.load(Ordering::SeqCst), 10);
    assert!(!h.coordinator.is_refreshing());
    assert!(h.navigator.visits().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_rejected_redirects_once_for_all_callers() {
    let h = harness(Duration::from_millis(200));
    h.api.refresh_status.store(401, Ordering::SeqCst);
    h.clock.record_login(now_millis() - 70 * MINUTE_MS).unwrap();

    let uploads = (0..3).map(|_| h.client.upload("/upload", pdf(), ProgressTracker::silent()));
    let results = join_all(uploads).await;

    assert!(
        results
            .iter()
            .all(|r| matches!(r, Err(SessionError::SessionExpired))),
        "{results:?}"
    );
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
    assert_eq!(h.clock.login_timestamp().unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_followers_share_outcome_in_order() {
    let h = harness(Duration::from_secs(1));

    let outcomes = join_all((0..4).map(|_| h.coordinator.refresh(OnRejected::Defer))).await;

    assert_eq!(outcomes, vec![RefreshOutcome::Refreshed; 4]);
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.coordinator.pending_followers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_rejected_defer_does_not_redirect() {
    let h = harness(Duration::ZERO);
    h.api.refresh_status.store(403, Ordering::SeqCst);
    h.clock.record_login(now_millis()).unwrap();

    let outcome = h.coordinator.refresh(OnRejected::Defer).await;

    assert_eq!(outcome, RefreshOutcome::Rejected { status: 403 });
    assert!(h.navigator.visits().is_empty());
    assert_eq!(h.clock.login_timestamp().unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_cancelled_leader_releases_follower() {
    let h = harness(Duration::from_secs(10));

    let leader = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.refresh(OnRejected::Defer).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.coordinator.is_refreshing());

    let follower = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.refresh(OnRejected::Defer).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.coordinator.pending_followers(), 1);

    leader.abort();
    let outcome = follower.await.unwrap();

    assert!(matches!(outcome, RefreshOutcome::Unreachable { .. }));
    assert!(!h.coordinator.is_refreshing());
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);
}

// =========================================================================
// Authorized client
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_upload_refresh_then_success_updates_session_clock() {
    let h = harness(Duration::ZERO);
    let old_login = now_millis() - 55 * MINUTE_MS;
    h.clock.record_login(old_login).unwrap();

    let body = h
        .client
        .upload("/surat-masuk/upload", pdf(), ProgressTracker::silent())
        .await
        .unwrap();

    assert_eq!(body["data"]["id"], 7);
    assert_eq!(h.api.upload_calls.load(Ordering::SeqCst), 2);
    assert!(h.clock.login_timestamp().unwrap().unwrap() > old_login);
    assert!(
        !h.clock
            .status(&TokenConfig::default())
            .unwrap()
            .needs_refresh()
    );
}

#[tokio::test(start_paused = true)]
async fn test_upload_unauthorized_after_refresh_no_third_attempt() {
    let h = harness(Duration::ZERO);
    h.api.always_unauthorized.store(true, Ordering::SeqCst);
    h.clock.record_login(now_millis()).unwrap();

    let result = h.client.upload("/upload", pdf(), ProgressTracker::silent()).await;

    assert!(matches!(result, Err(SessionError::SessionExpired)));
    assert_eq!(h.api.upload_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.clock.login_timestamp().unwrap(), None);
    assert_eq!(h.navigator.visits().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_upload_refresh_unreachable_ends_session() {
    let h = harness(Duration::ZERO);
    h.api.refresh_unreachable.store(true, Ordering::SeqCst);
    h.clock.record_login(now_millis() - 30 * MINUTE_MS).unwrap();

    let result = h.client.upload("/upload", pdf(), ProgressTracker::silent()).await;

    match result {
        Err(SessionError::RefreshUnreachable(reason)) => {
            assert!(reason.contains("connection refused"), "{reason}");
        }
        other => panic!("expected RefreshUnreachable, got {other:?}"),
    }
    assert_eq!(h.clock.login_timestamp().unwrap(), None);
    assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
    assert_eq!(h.api.upload_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_upload_following_deferred_rejection_redirects() {
    let h = harness(Duration::from_millis(200));
    h.api.refresh_status.store(401, Ordering::SeqCst);
    h.clock.record_login(now_millis() - 70 * MINUTE_MS).unwrap();

    // A stream-style leader that leaves the redirect to itself.
    let leader = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.refresh(OnRejected::Defer).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.coordinator.is_refreshing());

    let result = h.client.upload("/upload", pdf(), ProgressTracker::silent()).await;

    assert!(matches!(result, Err(SessionError::SessionExpired)), "{result:?}");
    assert_eq!(leader.await.unwrap(), RefreshOutcome::Rejected { status: 401 });
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.clock.login_timestamp().unwrap(), None);
    assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);

    // The deferred redirect that follows does not navigate again.
    h.coordinator.redirect().redirect();
    assert_eq!(h.navigator.visits().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deferred_redirect_after_immediate_one_is_suppressed() {
    let h = harness(Duration::ZERO);
    h.api.refresh_status.store(401, Ordering::SeqCst);
    h.coordinator.start_session().unwrap();

    let outcome = h.coordinator.refresh(OnRejected::RedirectNow).await;
    assert_eq!(outcome, RefreshOutcome::Rejected { status: 401 });
    h.coordinator.redirect().redirect();
    assert_eq!(h.navigator.visits().len(), 1);

    // A new login allows the next session to be redirected.
    h.coordinator.start_session().unwrap();
    assert!(h.clock.login_timestamp().unwrap().is_some());
    h.coordinator.refresh(OnRejected::RedirectNow).await;
    assert_eq!(h.navigator.visits().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_upload_server_error_uses_response_desc() {
    let h = harness(Duration::ZERO);
    *h.api.fixed_response.lock().unwrap() = Some(HttpResponse::new(
        413,
        r#"{"responseCode":"413","responseDesc":"Ukuran file terlalu besar"}"#,
    ));

    let result = h.client.upload("/upload", pdf(), ProgressTracker::silent()).await;

    match result {
        Err(SessionError::UploadFailed { status, message }) => {
            assert_eq!(status, 413);
            assert_eq!(message, "Ukuran file terlalu besar");
        }
        other => panic!("expected UploadFailed, got {other:?}"),
    }
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_upload_progress_monotonic_across_retry() {
    let h = harness(Duration::ZERO);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress = ProgressTracker::new(move |pct| sink.lock().unwrap().push(pct));

    h.client.upload("/upload", pdf(), progress).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert_eq!(seen.last(), Some(&100));
}

#[tokio::test(start_paused = true)]
async fn test_send_json_refreshes_and_replays() {
    let h = harness(Duration::ZERO);
    h.clock.record_login(now_millis()).unwrap();

    let body = h
        .client
        .send_json(ApiRequest::post("/disposisi", json!({"suratId": 7})))
        .await
        .unwrap();

    assert_eq!(body["responseCode"], "200");
    assert_eq!(h.api.send_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_json_non_auth_error_is_request_failed() {
    let h = harness(Duration::ZERO);
    *h.api.fixed_response.lock().unwrap() = Some(HttpResponse::new(404, ""));

    let result = h.client.send_json(ApiRequest::get("/dinas/99")).await;

    assert!(matches!(
        result,
        Err(SessionError::RequestFailed { status: 404, ref message }) if message == "Request failed"
    ));
}

// =========================================================================
// Keepalive
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_keepalive_refreshes_past_threshold() {
    let h = harness(Duration::ZERO);
    h.clock.record_login(now_millis() - 50 * MINUTE_MS).unwrap();

    let keepalive = KeepAlive::spawn(
        h.coordinator.clone(),
        TokenConfig::from_minutes(60, 1),
        true,
    );
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(
        !h.clock
            .status(&TokenConfig::default())
            .unwrap()
            .needs_refresh()
    );

    // Fresh token: the next check does nothing.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);

    keepalive.stop();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!keepalive.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_check_session_expired_ends_session() {
    let h = harness(Duration::ZERO);
    h.clock.record_login(now_millis() - 61 * MINUTE_MS).unwrap();

    let action = check_session(&h.coordinator, &TokenConfig::default(), false).await;

    assert_eq!(action, KeepAliveAction::Expire);
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.clock.login_timestamp().unwrap(), None);
    assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_check_session_not_logged_in_is_idle() {
    let h = harness(Duration::ZERO);

    let action = check_session(&h.coordinator, &TokenConfig::default(), false).await;

    assert_eq!(action, KeepAliveAction::Idle);
    assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(h.navigator.visits().is_empty());
}
