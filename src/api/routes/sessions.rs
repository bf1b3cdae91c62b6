//! Read-only view of active sessions.

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::session::SessionSummary;
use axum::{extract::State, response::Json, routing::get, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sessions", get(list_sessions))
        .with_state(state)
}

async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<SessionSummary>>> {
    Ok(Json(state.registry.sessions().await?))
}
