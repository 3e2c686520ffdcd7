//! Runtime selection.

use super::{ContainerRuntime, EngineRuntime};
use crate::config::Config;
use std::sync::Arc;
use tracing::info;

/// Factory for constructing the configured container runtime.
pub struct RuntimeFactory;

impl RuntimeFactory {
    /// Create the runtime for this process.
    ///
    /// The engine binary comes from `SKIFF_ENGINE` when set, otherwise from
    /// the config file (default "docker"). Availability is not probed here;
    /// a missing binary surfaces as `RuntimeUnavailable` on first use.
    pub fn create(config: &Config) -> Arc<dyn ContainerRuntime> {
        let bin = std::env::var("SKIFF_ENGINE").unwrap_or_else(|_| config.engine_bin.clone());
        info!(engine = %bin, "Selected container runtime");
        Arc::new(EngineRuntime::new(bin))
    }
}
