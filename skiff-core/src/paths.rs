//! Centralized path configuration for SKIFF.
//!
//! All data paths go through this module so the CLI and the test suite
//! agree on where state lives.

use std::path::PathBuf;

/// Get the SKIFF data directory.
///
/// Resolution order:
/// 1. `SKIFF_DATA_DIR` environment variable
/// 2. `/var/lib/skiff` if it exists (system install)
/// 3. `~/.skiff` for user-only installs
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SKIFF_DATA_DIR") {
        return PathBuf::from(dir);
    }

    let system_dir = PathBuf::from("/var/lib/skiff");
    if system_dir.exists() {
        return system_dir;
    }

    dirs::home_dir().map(|h| h.join(".skiff")).unwrap_or(system_dir)
}

/// Get the state database path.
pub fn db_path() -> PathBuf {
    data_dir().join("skiff.db")
}

/// Get the directory holding named volume backing storage.
pub fn volumes_dir() -> PathBuf {
    data_dir().join("volumes")
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
