//! Transport runner.
//!
//! Drives the [`McpBridge`] under one of three transports, chosen once at
//! startup:
//!
//! | Transport | Listener | Endpoints |
//! |-----------|----------|-----------|
//! | `streamable-http` | `host:port` | `POST/GET/DELETE /mcp`, `GET /health` |
//! | `sse` (legacy) | `host:port` | `GET /sse`, `POST /messages?session_id=…`, `GET /health` |
//! | `stdio` (legacy) | none | stdin/stdout |
//!
//! Both HTTP transports are wrapped in the [`SecurityPolicy`] middleware,
//! derived from the same host string the listener binds to.
//!
//! # Client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "azure-search": { "type": "http", "url": "http://localhost:8000/mcp" }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use axum::{middleware, routing::get, Json, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::config::TransportKind;
use crate::mcp::McpBridge;
use crate::security::{self, SecurityPolicy};
use crate::sse;

/// Runs `bridge` on the selected transport until shutdown.
///
/// Bind failures are returned as errors; nothing is retried.
pub async fn run(bridge: McpBridge, transport: TransportKind, host: &str, port: u16) -> Result<()> {
    match transport {
        TransportKind::Stdio => run_stdio(bridge).await,
        TransportKind::StreamableHttp | TransportKind::Sse => {
            let policy = SecurityPolicy::derive(host);
            tracing::info!(
                host,
                rebinding_protection = policy.rebinding_protection,
                "derived transport security policy"
            );

            let app = match transport {
                TransportKind::Sse => sse::router(bridge),
                _ => streamable_http_router(bridge),
            };
            let app = secure(app, policy);

            let listener = TcpListener::bind((host, port))
                .await
                .with_context(|| format!("failed to bind {}:{}", host, port))?;
            let addr = listener.local_addr()?;
            tracing::info!(%transport, "MCP server listening on http://{}", addr);

            serve(listener, app).await
        }
    }
}

/// Serves MCP over the process's stdin/stdout. Never opens a socket.
pub async fn run_stdio(bridge: McpBridge) -> Result<()> {
    tracing::info!("MCP server running on stdio");
    let service = bridge
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP server over stdio")?;
    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;
    Ok(())
}

/// Router for the streamable HTTP transport, without the security layer.
pub fn streamable_http_router(bridge: McpBridge) -> Router {
    let service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    Router::new()
        .nest_service("/mcp", service)
        .route("/health", get(handle_health))
}

/// Wraps `app` with the admission policy and a permissive CORS layer.
///
/// CORS sits outside the policy so preflights are answered, while the
/// actual request still has to pass the Host/Origin checks.
pub fn secure(app: Router, policy: SecurityPolicy) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    app.layer(middleware::from_fn_with_state(
        Arc::new(policy),
        security::enforce,
    ))
    .layer(cors)
}

/// Serves `app` on an already-bound listener until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`, used by container probes.
pub(crate) async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
