//! Control channel endpoints.
//!
//! - `GET /ws`: the backend's WebSocket. Text frames carry commands in,
//!   events go out the same socket. One backend at a time.
//! - `POST /command`: submit a single command over plain HTTP.

use crate::api::error::{ApiError, ApiResult};
use crate::api::link::AttachedBackend;
use crate::api::AppState;
use crate::session::{Command, RegistryHandle};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(backend_socket))
        .route("/command", post(submit_command))
        .with_state(state)
}

async fn submit_command(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    info!("Command received via HTTP for user {}", command.user_id());
    state.registry.send(command)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "success": true }))))
}

async fn backend_socket(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    let Some(events) = state.link.attach() else {
        warn!("Rejected backend connection: another backend is attached");
        return ApiError::conflict("a backend is already connected").into_response();
    };

    let registry = state.registry.clone();
    upgrade.on_upgrade(move |socket| async move {
        info!("Backend connected");
        relay(socket, events, registry).await;
        info!("Backend disconnected");
    })
}

/// Pump commands from the socket into the registry and events back out,
/// until either side goes away.
async fn relay(mut socket: WebSocket, mut events: AttachedBackend, registry: RegistryHandle) {
    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Command>(&text) {
                    Ok(command) => {
                        debug!("Command received via WebSocket: {:?}", command);
                        if registry.send(command).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed command {:?}: {}", text, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Backend socket error: {}", e);
                    break;
                }
            },
            event = events.recv() => {
                let Some(event) = event else { break };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Failed to serialize event {:?}: {}", event, e);
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    warn!("Backend went away, event lost: {:?}", event);
                    break;
                }
            }
        }
    }
}
