//! Shared application state for axum handlers.

use hauslink_app::engine::EngineHandle;

/// Application state shared across all axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle into the engine: snapshots, commands, and the update fanout.
    pub engine: EngineHandle,
}

impl AppState {
    #[must_use]
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}
