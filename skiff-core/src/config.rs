//! Configuration management.

use crate::error::{Result, SkiffError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Persistent configuration for SKIFF.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds a dependent waits for a dependency's readiness probe.
    pub readiness_timeout_secs: u64,
    /// Milliseconds between readiness probe attempts.
    pub readiness_interval_ms: u64,
    /// Seconds a service is given to stop gracefully before force removal.
    pub stop_timeout_secs: u64,
    pub log_level: String,
    /// Container engine binary the runtime seam invokes ("docker", "podman", ...).
    pub engine_bin: String,
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            readiness_timeout_secs: 60,
            readiness_interval_ms: 500,
            stop_timeout_secs: 30,
            log_level: "info".to_string(),
            engine_bin: "docker".to_string(),
            data_dir: paths::data_dir().to_string_lossy().to_string(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_path()
    }

    /// Load configuration from disk, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| SkiffError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| SkiffError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SkiffError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| SkiffError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(&path, content).map_err(|e| SkiffError::IoError { path, source: e })
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.readiness_timeout_secs, 60);
        assert_eq!(config.engine_bin, "docker");
        assert_eq!(config.stop_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_round_trip() {
        let config = Config { readiness_timeout_secs: 5, ..Default::default() };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.readiness_timeout_secs, 5);
    }
}
