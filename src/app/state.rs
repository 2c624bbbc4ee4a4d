//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{HistoryPruner, Registry, Simulator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<Registry>,
    pub simulator: Arc<Simulator>,
    pub pruner: Arc<HistoryPruner>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let registry = Arc::new(Registry::new(config.simulation.world_config()));
        let simulator = Arc::new(Simulator::new(registry.clone()));
        let pruner = Arc::new(HistoryPruner::new(
            registry.clone(),
            config.simulation.retention_ms,
        ));

        Self {
            config,
            registry,
            simulator,
            pruner,
        }
    }
}
