pub mod config;
pub mod eval;
pub mod serve;

use std::sync::Arc;

use kibitz_core::{EngineManager, ProcessBackendFactory};
use tracing::{info, warn};

use crate::config::KibitzConfig;

/// Build a manager that runs the configured engine binary
pub fn build_manager(config: &KibitzConfig) -> EngineManager {
    let manager_config = config.manager_config();
    let factory = ProcessBackendFactory::new(manager_config.engine.clone());

    match factory.locate() {
        Ok(path) => info!(engine = %path.display(), "Using engine"),
        Err(e) => warn!(error = %e, "Engine not found; evaluations will fail until it is installed"),
    }

    EngineManager::new(Arc::new(factory), manager_config)
}
