//! Service domain types.

use crate::types::network::PortMapping;
use crate::types::volume::{Bind, VolumeMount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A single deployable unit: one service from the manifest, fully resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name (unique key within a stack)
    pub name: String,

    /// Where the service's image comes from
    pub source: ServiceSource,

    /// Environment variables (post-substitution)
    pub environment: HashMap<String, String>,

    /// Exposed port mappings
    pub ports: Vec<PortMapping>,

    /// Services this service depends on
    pub depends_on: Vec<String>,

    /// Networks this service joins
    pub networks: Vec<String>,

    /// Volume mounts
    pub volumes: Vec<VolumeMount>,
}

/// Image source for a service: a prebuilt image reference or a build context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceSource {
    /// Prebuilt image reference (e.g. "postgres:16")
    Image(String),

    /// Build from a local context
    Build(BuildSource),
}

/// Build context handed to the container runtime's `build` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSource {
    /// Build context directory
    pub context: PathBuf,

    /// Dockerfile path relative to the context (runtime default when None)
    pub dockerfile: Option<String>,

    /// Tag the built image will carry
    pub tag: String,
}

/// Per-service run state, owned exclusively by the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Not yet scheduled; dependencies not confirmed ready
    Pending,

    /// Handed to the runtime, waiting for readiness
    Starting,

    /// Readiness confirmed
    Running,

    /// Stopped by teardown or rollback
    Stopped,

    /// Start or readiness wait failed
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown run state: {}", s)),
        }
    }
}

/// Everything the runtime needs to launch one container.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Container name ("<stack>_<service>")
    pub name: String,

    /// Environment variables
    pub env: HashMap<String, String>,

    /// Port mappings
    pub ports: Vec<PortMapping>,

    /// Network to join
    pub network: Option<String>,

    /// Resolved host-path bindings
    pub binds: Vec<Bind>,
}

/// Handle returned by the runtime after launching a container.
/// Represents "this container exists" without owning the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Runtime-assigned container ID
    pub id: String,

    /// Container name
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_run_state_round_trip() {
        for state in
            [RunState::Pending, RunState::Starting, RunState::Running, RunState::Stopped, RunState::Failed]
        {
            assert_eq!(RunState::from_str(&state.to_string()).unwrap(), state);
        }
        assert!(RunState::from_str("exploded").is_err());
    }
}
