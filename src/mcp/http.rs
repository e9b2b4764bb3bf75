// HTTP transport for the MCP server
//
// Routes:
// - POST /mcp, POST /messages: one JSON-RPC message per request
// - GET /metrics: Prometheus text
// - GET /health: vault accessibility, never authenticated

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::mcp::server::McpServer;
use crate::metrics;

/// Shared state for every HTTP handler
#[derive(Clone)]
pub struct AppState {
    server: Arc<McpServer>,
    auth_token: Option<Arc<str>>,
    whitelist_enabled: bool,
    started: Instant,
}

impl AppState {
    /// `auth_token` of `None` disables bearer checks
    pub fn new(server: McpServer, auth_token: Option<String>) -> Self {
        let whitelist_enabled = server.tools().gateway_config().whitelist_enabled;
        Self {
            server: Arc::new(server),
            auth_token: auth_token.map(Arc::from),
            whitelist_enabled,
            started: Instant::now(),
        }
    }

    /// Build state from the `[server]` section
    pub fn from_config(server: McpServer, config: &ServerConfig) -> Self {
        let token = config.auth_enabled.then(|| config.auth_token.clone());
        Self::new(server, token)
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/messages", post(mcp_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .merge(protected)
        .route("/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serve HTTP until Ctrl-C
pub async fn serve(server: McpServer, config: &ServerConfig) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    let state = AppState::from_config(server, config);
    if state.auth_token.is_none() {
        warn!("Authentication is disabled; any client can run commands");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
    info!("Starting MCP HTTP server on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.auth_token {
        if !bearer_matches(request.headers(), expected) {
            warn!("Rejected unauthenticated request to {}", request.uri().path());
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response();
        }
    }
    next.run(request).await
}

async fn mcp_handler(State(state): State<AppState>, body: String) -> Response {
    match state.server.handle_message(&body).await {
        Some(response) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            response,
        )
            .into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    metrics::UPTIME_SECONDS.set(state.started.elapsed().as_secs_f64());
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let vaults = state.server.tools().vaults().health();
    let healthy = !vaults.is_empty() && vaults.iter().all(|v| v.accessible);

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.started.elapsed().as_secs(),
        "vaults": vaults,
        "whitelist_enabled": state.whitelist_enabled,
        "auth_enabled": state.auth_token.is_some(),
    });

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_matches() {
        let mut headers = HeaderMap::new();
        assert!(!bearer_matches(&headers, "s3cret"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert!(bearer_matches(&headers, "s3cret"));
        assert!(!bearer_matches(&headers, "other"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic s3cret"));
        assert!(!bearer_matches(&headers, "s3cret"));
    }
}
