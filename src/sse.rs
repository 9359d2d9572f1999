//! Legacy HTTP+SSE transport.
//!
//! Older MCP clients (and MCP Inspector) speak the two-endpoint protocol:
//!
//! 1. `GET /sse` opens an event stream. The first event is `endpoint`,
//!    whose data is the URL to POST messages to:
//!    `/messages?session_id=<uuid>`.
//! 2. The client POSTs each JSON-RPC message there and gets `202 Accepted`.
//! 3. Server messages come back on the stream as `message` events.
//!
//! Each session runs its own rmcp service over an in-memory sink/stream
//! pair. Closing the stream ends the session; calls still in flight are
//! abandoned.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::channel::mpsc::{self, UnboundedSender};
use futures::{stream, Stream, StreamExt};
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::ServiceExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::mcp::McpBridge;
use crate::server::handle_health;

pub const SSE_PATH: &str = "/sse";
pub const MESSAGE_PATH: &str = "/messages";

type Sessions = Arc<Mutex<HashMap<String, UnboundedSender<ClientJsonRpcMessage>>>>;

#[derive(Clone)]
struct SseState {
    bridge: McpBridge,
    sessions: Sessions,
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: String,
}

/// Router for the legacy SSE transport, without the security layer.
pub fn router(bridge: McpBridge) -> Router {
    let state = SseState {
        bridge,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    Router::new()
        .route(SSE_PATH, get(handle_sse))
        .route(MESSAGE_PATH, post(handle_message))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Lives inside the event stream; dropped when the client disconnects.
///
/// Removes the session from the table, which ends the service's inbound
/// stream, and drops `_closed` so the service task stops.
struct SessionGuard {
    id: String,
    sessions: Sessions,
    _closed: oneshot::Sender<()>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&self.id);
        }
        tracing::debug!(session = %self.id, "sse session closed");
    }
}

// ============ GET /sse ============

async fn handle_sse(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = uuid::Uuid::new_v4().to_string();

    let (to_server_tx, to_server_rx) = mpsc::unbounded::<ClientJsonRpcMessage>();
    let (to_client_tx, to_client_rx) = mpsc::unbounded::<ServerJsonRpcMessage>();

    if let Ok(mut sessions) = state.sessions.lock() {
        sessions.insert(session_id.clone(), to_server_tx);
    }
    tracing::debug!(session = %session_id, "sse session opened");

    let (closed_tx, closed_rx) = oneshot::channel::<()>();
    let guard = SessionGuard {
        id: session_id.clone(),
        sessions: state.sessions.clone(),
        _closed: closed_tx,
    };
    let bridge = state.bridge.clone();
    tokio::spawn(async move {
        let session = async move {
            match bridge.serve((to_client_tx, to_server_rx)).await {
                Ok(service) => {
                    if let Err(e) = service.waiting().await {
                        tracing::warn!("sse session task failed: {}", e);
                    }
                }
                Err(e) => tracing::warn!("sse session failed to initialize: {}", e),
            }
        };
        tokio::select! {
            _ = session => {}
            _ = closed_rx => {}
        }
    });

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{}?session_id={}", MESSAGE_PATH, session_id));

    let messages = to_client_rx
        .filter_map(|message| async move {
            match serde_json::to_string(&message) {
                Ok(json) => Some(Ok::<_, Infallible>(
                    Event::default().event("message").data(json),
                )),
                Err(e) => {
                    tracing::error!("failed to serialize server message: {}", e);
                    None
                }
            }
        })
        .map(move |event| {
            let _session = &guard;
            event
        });

    Sse::new(stream::once(async move { Ok::<_, Infallible>(endpoint) }).chain(messages))
        .keep_alive(KeepAlive::default())
}

// ============ POST /messages ============

async fn handle_message(
    State(state): State<SseState>,
    Query(query): Query<SessionQuery>,
    Json(message): Json<ClientJsonRpcMessage>,
) -> Response {
    let sender = state
        .sessions
        .lock()
        .ok()
        .and_then(|sessions| sessions.get(&query.session_id).cloned());

    let Some(sender) = sender else {
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    };

    if sender.unbounded_send(message).is_err() {
        return (StatusCode::GONE, "Session closed").into_response();
    }

    StatusCode::ACCEPTED.into_response()
}
