//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One listener carries everything: the websocket upgrade (at `/ws`, and at
//! `/` for older clients), the `/points` scoreboard, `/static` assets and a
//! health probe.

pub mod assets;
pub mod points;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_helpers;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = assets::router(&state.asset_dir);

    Router::new()
        .route("/", get(ws::handle_ws))
        .route("/ws", get(ws::handle_ws))
        .route("/points", get(points::points))
        .route("/healthz", get(healthz))
        .nest_service("/static", static_files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
