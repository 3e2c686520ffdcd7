//! Stack domain types.

use crate::types::network::NetworkMode;
use crate::types::service::ServiceSpec;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A validated set of services plus their volume and network declarations,
/// produced by the manifest loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSpec {
    /// Stack name
    pub name: String,

    /// Services in dependency-unordered manifest form
    pub services: Vec<ServiceSpec>,

    /// Declared named volumes
    pub volumes: Vec<VolumeSpec>,

    /// Declared networks
    pub networks: Vec<NetworkSpec>,
}

impl StackSpec {
    /// Look up a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Name of the default network every service joins unless it opts into
    /// explicit memberships.
    pub fn default_network(&self) -> String {
        format!("{}_default", self.name)
    }
}

/// Named volume declaration from the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Volume name
    pub name: String,

    /// Whether the volume survives `down` (scratch volumes do not)
    pub persistent: bool,
}

/// Network declaration from the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Network name
    pub name: String,

    /// Isolation mode
    pub mode: NetworkMode,
}

/// Persisted record of a deployed stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackRecord {
    /// Stack ID
    pub id: String,

    /// Stack name
    pub name: String,

    /// Services with their container handles, in start order
    pub services: Vec<ServiceRecord>,

    /// Creation timestamp
    pub created_at: SystemTime,
}

/// One service's persisted deployment state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Service name
    pub name: String,

    /// Runtime container ID, once launched
    pub container_id: Option<String>,

    /// Last observed run state ("running", "stopped", ...)
    pub status: String,

    /// Position in the start order; teardown walks this in reverse
    pub start_order: i64,
}
