mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::{Mode, MockConverter};
use pdf2docx_server::config::ServerConfig;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_returns_ok() {
    let scratch = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockConverter::new(Mode::EchoDocx));
    let app = common::app_with(mock.clone(), common::test_config(scratch.path()));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_bytes(response).await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!({ "status": "ok" }));

    assert_eq!(mock.opened(), 0);
    assert_eq!(common::scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_health_under_concurrent_load() {
    let scratch = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockConverter::new(Mode::EchoDocx));
    let app = common::app_with(mock, common::test_config(scratch.path()));

    let probes = (0..32).map(|_| app.clone().oneshot(get("/health")));
    for response in futures::future::join_all(probes).await {
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = common::body_bytes(response).await;
        assert_eq!(&body[..], br#"{"status":"ok"}"#);
    }
}

#[tokio::test]
async fn test_converter_health() {
    let scratch = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockConverter::new(Mode::EchoDocx));
    let app = common::app_with(mock, common::test_config(scratch.path()));

    let response = app.oneshot(get("/health/converter")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_bytes(response).await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["converter"], "mock");
    assert_eq!(json["page_ranges"], true);
}

#[tokio::test]
async fn test_cors_allow_list() {
    let scratch = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockConverter::new(Mode::EchoDocx));
    let app = common::app_with(mock, common::test_config(scratch.path()));

    let allowed = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );

    let foreign = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://evil.test")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(foreign).await.unwrap();
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn test_cors_wildcard_preflight() {
    let scratch = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockConverter::new(Mode::EchoDocx));
    let config = ServerConfig {
        scratch_dir: scratch.path().to_path_buf(),
        ..ServerConfig::development()
    };
    let app = common::app_with(mock, config);

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/convert")
        .header(header::ORIGIN, "http://anywhere.test")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(
        response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS)
    );
}

#[tokio::test]
async fn test_openapi_document() {
    let scratch = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockConverter::new(Mode::EchoDocx));
    let app = common::app_with(mock, common::test_config(scratch.path()));

    let response = app.oneshot(get("/api-docs/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_bytes(response).await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["paths"]["/convert"]["post"].is_object());
    assert!(json["paths"]["/health"]["get"].is_object());
}
