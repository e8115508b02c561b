//! Router-level tests for the HTTP transport: health check, API-key
//! authentication on `/mcp`, and CORS.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use github_mcp::config::{AllowedRepos, RepoScope};
use github_mcp::github::GithubClient;
use github_mcp::http::{router, ApiKey};
use github_mcp::server::McpGithubServer;

const INITIALIZE: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"test","version":"0.0.0"}}}"#;

fn app(api_key: Option<&str>) -> Router {
    let github = GithubClient::new(octocrab::Octocrab::default(), "https://api.github.com");
    let scope = RepoScope::new(None, None, AllowedRepos::default());
    let server = McpGithubServer::new(github, Arc::new(scope), "GitHub MCP Server", 30);
    router(server, ApiKey::new(api_key))
}

fn mcp_post() -> axum::http::request::Builder {
    Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let response = app(Some("s3cret"))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "GitHub MCP Server");
}

#[tokio::test]
async fn index_is_public() {
    let response = app(Some("s3cret"))
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn mcp_without_key_is_rejected() {
    let response = app(Some("s3cret"))
        .oneshot(mcp_post().body(Body::from(INITIALIZE)).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Unauthorized: Invalid API Key");
}

#[tokio::test]
async fn mcp_with_wrong_key_is_rejected() {
    let response = app(Some("s3cret"))
        .oneshot(
            mcp_post()
                .header("X-API-Key", "guess")
                .body(Body::from(INITIALIZE))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(Some("s3cret"))
        .oneshot(
            mcp_post()
                .header(header::AUTHORIZATION, "Bearer guess")
                .body(Body::from(INITIALIZE))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mcp_with_api_key_header_is_accepted() {
    let response = app(Some("s3cret"))
        .oneshot(
            mcp_post()
                .header("X-API-Key", "s3cret")
                .body(Body::from(INITIALIZE))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.status().is_success());
}

#[tokio::test]
async fn mcp_with_bearer_token_is_accepted() {
    let response = app(Some("s3cret"))
        .oneshot(
            mcp_post()
                .header(header::AUTHORIZATION, "Bearer s3cret")
                .body(Body::from(INITIALIZE))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mcp_is_open_without_configured_key() {
    let response = app(None)
        .oneshot(mcp_post().body(Body::from(INITIALIZE)).unwrap())
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let response = app(None)
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/mcp")
                .header(header::ORIGIN, "https://client.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
