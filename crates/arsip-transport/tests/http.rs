//! Integration tests for the HTTP transport.
//!
//! Each test starts a `wiremock` server playing the backend and points a
//! real `HttpTransport` at it, so requests go over an actual socket.

#![cfg(feature = "http")]

use std::sync::{Arc, Mutex};

use arsip_transport::{
    ApiRequest, EventSource, HttpTransport, ReadyState, Transport,
    TransportError, UploadFile, UploadRequest,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn no_progress() -> arsip_transport::ByteProgress {
    Arc::new(|_, _| {})
}

#[tokio::test]
async fn test_new_rejects_invalid_url() {
    let result = HttpTransport::new("not a url");
    assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
}

#[tokio::test]
async fn test_api_url_trailing_slash_trimmed() {
    let transport = HttpTransport::new("http://localhost:9000/api/").unwrap();
    assert_eq!(transport.api_url(), "http://localhost:9000/api");
}

#[tokio::test]
async fn test_refresh_success_returns_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auths/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&server.uri()).unwrap();
    let meta = transport.refresh().await.expect("round trip succeeds");

    assert!(meta.is_success());
}

#[tokio::test]
async fn test_refresh_error_status_is_not_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auths/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&server.uri()).unwrap();
    let meta = transport.refresh().await.expect("401 is still a response");

    assert_eq!(meta.status, 401);
    assert!(!meta.is_success());
}

#[tokio::test]
async fn test_refresh_unreachable_server_is_transport_error() {
    // Port 9 (discard) on localhost is almost never listening.
    let transport = HttpTransport::new("http://127.0.0.1:9").unwrap();
    let result = transport.refresh().await;
    assert!(matches!(result, Err(TransportError::Http(_))));
}

#[tokio::test]
async fn test_requests_carry_cookies_from_shared_jar() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auths/refresh"))
        .and(header("cookie", "refresh_token=abc"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let jar = Arc::new(reqwest::cookie::Jar::default());
    let url: reqwest::Url = server.uri().parse().unwrap();
    jar.add_cookie_str("refresh_token=abc", &url);

    let transport = HttpTransport::with_cookie_jar(&server.uri(), jar).unwrap();
    let meta = transport.refresh().await.unwrap();

    assert_eq!(meta.status, 204, "mock only matches with the cookie");
}

#[tokio::test]
async fn test_add_cookie_seeds_jar_for_api_origin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auths/refresh"))
        .and(header("cookie", "access_token=xyz"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&server.uri()).unwrap();
    transport.add_cookie("access_token=xyz").unwrap();
    let meta = transport.refresh().await.unwrap();

    assert_eq!(meta.status, 200);
}

#[tokio::test]
async fn test_send_json_post_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dinas"))
        .and(body_string_contains("Dinas Kesehatan"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 5})),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&server.uri()).unwrap();
    let response = transport
        .send(ApiRequest::post("/dinas", json!({"name": "Dinas Kesehatan"})))
        .await
        .unwrap();

    assert_eq!(response.status, 201);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["id"], 5);
}

#[tokio::test]
async fn test_upload_sends_multipart_file_field_and_reports_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents/upload"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"laporan.pdf\""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"responseDesc": "ok"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: arsip_transport::ByteProgress =
        Arc::new(move |sent, total| sink.lock().unwrap().push((sent, total)));

    // 150 KiB spans three upload chunks.
    let content = vec![b'x'; 150 * 1024];
    let transport = HttpTransport::new(&server.uri()).unwrap();
    let response = transport
        .upload(
            UploadRequest::new(
                "/documents/upload",
                UploadFile::new("laporan.pdf", content)
                    .with_content_type("application/pdf"),
            ),
            progress,
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(*seen.last().unwrap(), (150 * 1024, 150 * 1024));
}

#[tokio::test]
async fn test_upload_error_status_returned_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents/upload"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"responseDesc": "format tidak didukung"})),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&server.uri()).unwrap();
    let response = transport
        .upload(
            UploadRequest::new(
                "/documents/upload",
                UploadFile::new("a.exe", &b"MZ"[..]),
            ),
            no_progress(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 422);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["responseDesc"], "format tidak didukung");
}

#[tokio::test]
async fn test_open_events_refused_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications/stream"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&server.uri()).unwrap();
    let result = transport.open_events().await;

    assert!(matches!(
        result,
        Err(TransportError::Rejected { status: 401 })
    ));
}

#[tokio::test]
async fn test_open_events_decodes_frames_then_reports_closed() {
    let server = MockServer::start().await;
    let body = "event: sidebar\n\
                data: {\"code_notif\": 2, \"unread_count\": 9}\n\
                \n\
                : heartbeat\n\
                \n\
                event: header\n\
                data: {\"total\": 1}\n\
                \n";
    Mock::given(method("GET"))
        .and(path("/notifications/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&server.uri()).unwrap();
    let mut events = transport.open_events().await.unwrap();
    let state = events.ready_state();
    assert_eq!(state.get(), ReadyState::Open);

    let first = events.next_event().await.unwrap().expect("sidebar event");
    assert_eq!(first.event.as_deref(), Some("sidebar"));
    let second = events.next_event().await.unwrap().expect("header event");
    assert_eq!(second.event.as_deref(), Some("header"));
    assert_eq!(second.data, "{\"total\": 1}");

    let end = events.next_event().await.unwrap();
    assert!(end.is_none(), "body finished");
    assert_eq!(state.get(), ReadyState::Closed);
}
