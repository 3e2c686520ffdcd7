//! Volume domain types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Named volume with backing storage that survives lifecycle start/stop
/// cycles. Created on first use; removed only by explicit destroy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Volume ID
    pub id: String,

    /// Volume name (unique key for create-or-reuse)
    pub name: String,

    /// Host path to the backing directory
    pub path: PathBuf,

    /// Whether normal teardown keeps this volume. Non-persistent volumes
    /// are scratch space removed when their stack goes down.
    pub persistent: bool,

    /// Creation timestamp
    pub created_at: SystemTime,
}

/// Volume mount declared by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Named volume or host path
    pub source: String,

    /// Mount path inside the container
    pub target: String,

    /// Read-only mount
    pub readonly: bool,
}

impl VolumeMount {
    /// Whether the source refers to a named volume rather than a host path.
    pub fn is_named(&self) -> bool {
        !self.source.starts_with('/') && !self.source.starts_with('.')
    }
}

/// Resolved host-path binding handed to the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    /// Host path (named volumes resolve to their backing directory)
    pub source: PathBuf,

    /// Mount path inside the container
    pub target: String,

    /// Read-only mount
    pub readonly: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_vs_host_path_sources() {
        let named = VolumeMount {
            source: "db-data".to_string(),
            target: "/var/lib/postgresql/data".to_string(),
            readonly: false,
        };
        assert!(named.is_named());

        let bind = VolumeMount {
            source: "./config".to_string(),
            target: "/etc/config".to_string(),
            readonly: true,
        };
        assert!(!bind.is_named());

        let abs = VolumeMount {
            source: "/srv/data".to_string(),
            target: "/data".to_string(),
            readonly: false,
        };
        assert!(!abs.is_named());
    }
}
