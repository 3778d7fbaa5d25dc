use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{config::Config, engine::HybridEngine, error::Result};

/// Shared application state
pub struct ApiState {
    /// Time when the service started
    startup_time: Instant,
    pub engine: Arc<HybridEngine>,
}

impl ApiState {
    pub fn new(engine: HybridEngine) -> Self {
        Self {
            startup_time: Instant::now(),
            engine: Arc::new(engine),
        }
    }

    /// Initialize the API state from configuration
    pub fn initialize(config: Config) -> Result<Self> {
        Ok(Self::new(HybridEngine::from_config(config)?))
    }

    /// Get the uptime of the service
    pub fn uptime(&self) -> Duration {
        self.startup_time.elapsed()
    }

    pub fn default_top_k(&self) -> usize {
        self.engine.config().default_top_k
    }

    pub fn max_body_bytes(&self) -> usize {
        self.engine.config().max_body_bytes
    }
}
