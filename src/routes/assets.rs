//! Static assets under `/static`.
//!
//! Files come from the configured asset directory through `ServeDir`. Paths
//! that could escape that directory are refused with 403 before the file
//! service sees them.

use std::path::Path;

use axum::Router;
use axum::extract::Request;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::warn;

const ASSET_CACHE_CONTROL: &str = "public, max-age=3600";

pub fn router(asset_dir: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(asset_dir))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(ASSET_CACHE_CONTROL),
        ))
        .layer(middleware::from_fn(reject_unsafe_paths))
}

async fn reject_unsafe_paths(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if !is_safe_asset_path(path) {
        warn!(path, "asset path rejected");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    next.run(request).await
}

/// Whether a request path (relative to `/static`) stays inside the asset
/// directory. Encoded dots and separators are refused outright.
pub(crate) fn is_safe_asset_path(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    if ["%2e", "%2f", "%5c", "%00"].iter().any(|enc| lowered.contains(enc)) {
        return false;
    }

    let relative = path.strip_prefix('/').unwrap_or(path);
    if relative.starts_with('/') || relative.starts_with('\\') {
        return false;
    }

    relative
        .split(['/', '\\'])
        .all(|segment| segment != ".." && !segment.contains(':'))
}

#[cfg(test)]
#[path = "assets_test.rs"]
mod tests;
