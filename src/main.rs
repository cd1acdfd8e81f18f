mod catalog;
mod config;
mod message;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = config::Settings::parse().normalized();

    let catalog = match catalog::Catalog::load(&settings.catalog) {
        Ok(catalog) => {
            tracing::info!(path = %settings.catalog.display(), pages = catalog.len(), "catalog loaded");
            catalog
        }
        Err(e) => {
            tracing::error!(path = %settings.catalog.display(), error = %e, "catalog unavailable, starting with no pages");
            catalog::Catalog::default()
        }
    };

    let (engine, _engine_task) = services::engine::spawn_engine(Arc::new(catalog), settings.engine_queue);
    let state = state::AppState::new(engine, &settings);

    let app = routes::app(state);
    let addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, asset_dir = %settings.asset_dir.display(), "quizshow listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server failed");
}
