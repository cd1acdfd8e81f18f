//! `GET /points` — live scoreboard and per-team device counts.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn points(State(state): State<AppState>) -> Response {
    match state.engine.status().await {
        Some(status) => Json(status).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "engine unavailable").into_response(),
    }
}
