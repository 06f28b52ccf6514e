//! Integration tests for HTTP API endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestServer;
use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Helper to make JSON requests.
async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Helper to make a raw GET request, returning status, content-type,
/// content-disposition, and body bytes.
async fn raw_get(
    router: &axum::Router,
    uri: &str,
) -> (StatusCode, Option<String>, Option<String>, Vec<u8>) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let content_disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();

    (status, content_type, content_disposition, body)
}

fn registration_body(id: &str, target_url: &str) -> Value {
    json!({
        "id": id,
        "targetUrl": target_url,
        "contentType": "image/png",
    })
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let (status, body) = json_request(&server.router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ok"));
}

#[tokio::test]
async fn test_create_returns_stored_record() {
    let server = TestServer::new().await;

    let body = json!({
        "id": "doc-1",
        "targetUrl": "https://files.example.com/a.pdf",
        "contentType": "application/pdf",
        "downloadName": "report.pdf",
        "authMode": "basic",
        "expiresInMinutes": 30,
    });

    let (status, response) = json_request(&server.router, "POST", "/file", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response.get("message").and_then(|v| v.as_str()),
        Some("File uploaded")
    );

    let file = response.get("file").unwrap();
    assert_eq!(file["id"], "doc-1");
    assert_eq!(file["targetUrl"], "https://files.example.com/a.pdf");
    assert_eq!(file["downloadName"], "report.pdf");
    assert_eq!(file["authMode"], "basic");
    assert!(file["expiresAt"].is_i64(), "relative expiry must be resolved");
    assert!(file.get("expiresInMinutes").is_none());

    assert!(server.store().exists("doc-1").await.unwrap());
}

#[tokio::test]
async fn test_create_duplicate_id_rejected() {
    let server = TestServer::new().await;

    let first = registration_body("doc-1", "https://files.example.com/a.png");
    let (status, _) = json_request(&server.router, "POST", "/file", Some(first)).await;
    assert_eq!(status, StatusCode::OK);

    let second = registration_body("doc-1", "https://elsewhere.example.com/b.png");
    let (status, response) = json_request(&server.router, "POST", "/file", Some(second)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.get("message").and_then(|v| v.as_str()),
        Some("ALREADY_EXISTS")
    );

    // The first registration must remain untouched.
    let stored = server.store().get("doc-1").await.unwrap();
    assert_eq!(stored.target_url, "https://files.example.com/a.png");
}

#[tokio::test]
async fn test_create_rejects_unsafe_id() {
    let server = TestServer::new().await;

    for id in ["../escape", "a/b", "", ".."] {
        let body = registration_body(id, "https://files.example.com/a.png");
        let (status, response) = json_request(&server.router, "POST", "/file", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "id {id:?} must be rejected");
        assert_eq!(
            response.get("message").and_then(|v| v.as_str()),
            Some("CREATE_ERROR")
        );
    }
}

#[tokio::test]
async fn test_create_rejects_invalid_target_url() {
    let server = TestServer::new().await;

    let body = registration_body("doc-1", "not a url");
    let (status, response) = json_request(&server.router, "POST", "/file", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.get("message").and_then(|v| v.as_str()),
        Some("CREATE_ERROR")
    );
}

#[tokio::test]
async fn test_delete_roundtrip() {
    let server = TestServer::new().await;

    let body = registration_body("doc-1", "https://files.example.com/a.png");
    json_request(&server.router, "POST", "/file", Some(body)).await;

    let (status, response) = json_request(&server.router, "DELETE", "/file/doc-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response.get("message").and_then(|v| v.as_str()),
        Some("DELETED")
    );
    assert!(!server.store().exists("doc-1").await.unwrap());
}

#[tokio::test]
async fn test_delete_missing_fails() {
    let server = TestServer::new().await;

    let (status, response) = json_request(&server.router, "DELETE", "/file/ghost", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.get("message").and_then(|v| v.as_str()),
        Some("DELETE_ERROR")
    );
}

#[tokio::test]
async fn test_fetch_missing_renders_trilingual_page() {
    let server = TestServer::new().await;

    let (status, content_type, _, body) = raw_get(&server.router, "/file/ghost").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(content_type.unwrap().starts_with("text/html"));

    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("could not be found"));
    assert!(page.contains("nu a fost găsit"));
    assert!(page.contains("не найден"));
}

#[tokio::test]
async fn test_fetch_streams_upstream_bytes() {
    let server = TestServer::new().await;
    let upstream = MockServer::start();

    let payload = b"\x89PNG fake image bytes".to_vec();
    let mock = upstream.mock(|when, then| {
        when.method(GET).path("/remote.png");
        then.status(200).body(payload.clone());
    });

    let body = registration_body("img", &upstream.url("/remote.png"));
    let (status, _) = json_request(&server.router, "POST", "/file", Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, content_type, content_disposition, bytes) =
        raw_get(&server.router, "/file/img").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert!(content_disposition.is_none());
    assert_eq!(bytes, payload);
    mock.assert();
}

#[tokio::test]
async fn test_fetch_sets_content_disposition_for_download_name() {
    let server = TestServer::new().await;
    let upstream = MockServer::start();

    upstream.mock(|when, then| {
        when.method(GET).path("/remote.pdf");
        then.status(200).body("pdf bytes");
    });

    let body = json!({
        "id": "named",
        "targetUrl": upstream.url("/remote.pdf"),
        "contentType": "application/pdf",
        "downloadName": "report.pdf",
    });
    json_request(&server.router, "POST", "/file", Some(body)).await;

    let (status, _, content_disposition, _) = raw_get(&server.router, "/file/named").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content_disposition.as_deref(),
        Some("attachment; filename=\"report.pdf\"")
    );
}

#[tokio::test]
async fn test_fetch_upstream_error_status_is_not_found() {
    let server = TestServer::new().await;
    let upstream = MockServer::start();

    upstream.mock(|when, then| {
        when.method(GET).path("/broken");
        then.status(500).body("internal error");
    });

    let body = registration_body("broken", &upstream.url("/broken"));
    json_request(&server.router, "POST", "/file", Some(body)).await;

    let (status, content_type, _, page) = raw_get(&server.router, "/file/broken").await;

    // Any non-200 upstream answer collapses into the 404 page; the
    // original status is not forwarded.
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(String::from_utf8(page).unwrap().contains("could not be found"));
}

#[tokio::test]
async fn test_fetch_unreachable_upstream_is_download_error() {
    let server = TestServer::new().await;

    // Nothing listens on port 1.
    let body = registration_body("dead", "http://127.0.0.1:1/unreachable");
    json_request(&server.router, "POST", "/file", Some(body)).await;

    let (status, content_type, _, page) = raw_get(&server.router, "/file/dead").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(
        String::from_utf8(page)
            .unwrap()
            .contains("could not be downloaded")
    );
}

#[tokio::test]
async fn test_rate_limit_rejects_after_burst() {
    let server = TestServer::with_config(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_minute = 60;
        config.rate_limit.burst_size = 2;
    })
    .await;

    // Without ConnectInfo every oneshot request lands in the shared
    // "unknown" bucket, which is exactly what this test needs.
    let (status, _) = json_request(&server.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = json_request(&server.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = json_request(&server.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body.get("retry_after").is_some());
}
