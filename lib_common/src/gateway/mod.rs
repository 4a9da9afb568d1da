//! # WebSocket Gateway
//!
//! The axum front door of the service. `/ws` upgrades to a WebSocket whose
//! text frames are routed through the [`PluginRegistry`]; replies come back
//! through the [`Dispatcher`] queue of the same connection. `/health`
//! reports liveness and the cache size.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::core::{CacheStore, ConnectionId, Dispatcher, PluginRegistry};

/// Shared handles every connection task works against.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<PluginRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<CacheStore>,
}

impl GatewayState {
    pub fn new(registry: Arc<PluginRegistry>, dispatcher: Arc<Dispatcher>, store: Arc<CacheStore>) -> Self {
        Self {
            registry,
            dispatcher,
            store,
        }
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serves the gateway on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: GatewayState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Gateway listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn health_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "records": state.store.len() }))
}

/// Hands one inbound message to the registry on the blocking pool; a
/// query scans the whole cache.
async fn route_message(state: &GatewayState, id: ConnectionId, message: Value) {
    let registry = Arc::clone(&state.registry);
    let dispatcher = Arc::clone(&state.dispatcher);
    let routed = tokio::task::spawn_blocking(move || registry.route(id, message, &*dispatcher)).await;

    if let Err(e) = routed {
        tracing::error!(connection = %id, error = %e, "Routing task failed");
    }
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let id = ConnectionId::next();
    let mut outbound = state.dispatcher.add_client(id);
    let (mut sink, mut stream) = socket.split();
    tracing::info!(connection = %id, "Client connected");

    loop {
        tokio::select! {
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Value>(text.as_str()) {
                            Ok(message) => route_message(&state, id, message).await,
                            Err(e) => tracing::warn!(connection = %id, error = %e, "Ignoring non-JSON frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(connection = %id, error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
            Some(text) = outbound.recv() => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.dispatcher.remove_client(id);
    tracing::info!(connection = %id, "Client disconnected");
}
