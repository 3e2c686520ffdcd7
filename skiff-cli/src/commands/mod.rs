//! CLI command implementations.

pub mod down;
pub mod ps;
pub mod up;

use skiff_core::{Config, LifecycleController, Result, RuntimeFactory, StateManager};
use std::sync::Arc;

/// Build the controller every command drives: config, state store, runtime.
pub async fn controller() -> Result<(LifecycleController, Arc<StateManager>)> {
    let config = Config::load()?;
    let state = Arc::new(StateManager::new(skiff_core::paths::db_path()).await?);
    let runtime = RuntimeFactory::create(&config);
    let controller = LifecycleController::new(Arc::clone(&state), runtime, &config);
    Ok((controller, state))
}

/// Render a run status with the usual colors.
pub fn colorize_status(status: &str) -> String {
    use colored::Colorize;
    match status {
        "running" => status.green().to_string(),
        "starting" | "pending" => status.yellow().to_string(),
        "failed" => status.red().to_string(),
        _ => status.dimmed().to_string(),
    }
}
