//! Network domain types.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Network isolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Isolated bridge scoping service-to-service name resolution.
    #[default]
    Bridge,

    /// No isolation; services share the host namespace.
    None,
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkMode::Bridge => write!(f, "bridge"),
            NetworkMode::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for NetworkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bridge" => Ok(NetworkMode::Bridge),
            "none" => Ok(NetworkMode::None),
            _ => Err(format!("Unknown network mode: {}", s)),
        }
    }
}

/// Isolated network, created before any member service starts and destroyed
/// only by explicit removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Network ID
    pub id: String,

    /// Network name (unique key for create-or-reuse)
    pub name: String,

    /// Isolation mode
    pub mode: NetworkMode,

    /// Creation timestamp
    pub created_at: SystemTime,
}

/// Port mapping (host:container).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Host port
    pub host_port: u16,

    /// Container port
    pub container_port: u16,

    /// Protocol (tcp, udp)
    pub protocol: Protocol,
}

/// Network protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_network_mode_round_trip() {
        assert_eq!(NetworkMode::from_str("bridge").unwrap(), NetworkMode::Bridge);
        assert_eq!(NetworkMode::from_str("NONE").unwrap(), NetworkMode::None);
        assert!(NetworkMode::from_str("overlay").is_err());
        assert_eq!(NetworkMode::Bridge.to_string(), "bridge");
    }
}
