//! Application state shared across routes

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::game::{spawn_worlds, WorldRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub worlds: Arc<WorldRegistry>,
}

impl AppState {
    /// Build state and start the configured worlds. Must be called from
    /// within a tokio runtime.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let worlds = Arc::new(WorldRegistry::new());

        let started = spawn_worlds(&worlds, config.world_count, &config.sim);
        info!(worlds = started.len(), "Worlds started");

        Self { config, worlds }
    }
}
