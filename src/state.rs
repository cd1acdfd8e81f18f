//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! carries no show state itself, only the handle to the engine task that owns
//! it, plus the settings routes need at request time.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::engine::EngineHandle;

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub port: u16,
    /// Per-connection outbound queue capacity.
    pub session_queue: usize,
    pub asset_dir: Arc<PathBuf>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: EngineHandle, settings: &Settings) -> Self {
        Self {
            engine,
            port: settings.port,
            session_queue: settings.session_queue.max(1),
            asset_dir: Arc::new(settings.asset_dir.clone()),
        }
    }
}
