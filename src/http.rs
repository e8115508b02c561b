//! Streamable HTTP transport: the MCP endpoint on `/mcp` behind API-key
//! authentication, plus an index page and an unauthenticated health check.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::server::McpGithubServer;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>GitHub MCP Server</title></head>
<body>
    <h1>GitHub MCP Server</h1>
    <p>MCP endpoint: <code>POST /mcp</code> (header <code>X-API-Key</code>)</p>
    <p>Health check: <code>GET /health</code></p>
</body>
</html>"#;

/// The key clients must present on `/mcp`. `None` disables authentication.
#[derive(Debug, Clone, Default)]
pub struct ApiKey(Option<Arc<str>>);

impl ApiKey {
    pub fn new(key: Option<&str>) -> Self {
        Self(
            key.map(str::trim)
                .filter(|k| !k.is_empty())
                .map(Arc::from),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.0, presented) {
            (None, _) => true,
            (Some(expected), Some(presented)) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
            (Some(_), None) => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extract Bearer token from Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// The key from `X-API-Key`, falling back to `Authorization: Bearer`.
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| extract_bearer_token(headers))
}

fn peer(headers: &HeaderMap, request: &Request<axum::body::Body>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return forwarded.trim().to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn auth_middleware(
    State(api_key): State<ApiKey>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if api_key.accepts(extract_api_key(&headers).as_deref()) {
        return next.run(request).await;
    }

    tracing::warn!(peer = %peer(&headers, &request), path = %request.uri().path(), "Rejected request with missing or invalid API key");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Unauthorized: Invalid API Key"})),
    )
        .into_response()
}

/// Streamable HTTP answers a GET without `Accept: text/event-stream` with
/// 406; some clients omit it, so GETs always get it.
async fn force_event_stream(mut request: Request<axum::body::Body>, next: Next) -> Response {
    if request.method() == Method::GET {
        request.headers_mut().insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
    }
    next.run(request).await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Build the application router.
///
/// Every `/mcp` request gets a fresh clone of `server` (stateless mode);
/// state that must outlive a request lives behind the server's `Arc`s.
pub fn router(server: McpGithubServer, api_key: ApiKey) -> Router {
    let service_name = server.name().to_string();

    let config = StreamableHttpServerConfig {
        stateful_mode: false,
        ..Default::default()
    };
    let mcp_service: StreamableHttpService<McpGithubServer, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(server.clone()),
            LocalSessionManager::default().into(),
            config,
        );

    let protected_mcp = Router::new()
        .nest_service("/mcp", mcp_service)
        .layer(middleware::from_fn(force_event_stream))
        .layer(middleware::from_fn_with_state(api_key, auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)]);

    Router::new()
        .route("/", get(index))
        .route(
            "/health",
            get(move || {
                let service = service_name.clone();
                async move { Json(json!({"status": "ok", "service": service})) }
            }),
        )
        .merge(protected_mcp)
        .layer(cors)
}

/// Serve `app` on `addr` until Ctrl-C or SIGTERM.
pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "MCP Streamable HTTP server listening (endpoint /mcp)");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl_c: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down MCP server...");
}
