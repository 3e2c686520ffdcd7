//! Manifest file format types.
//!
//! The manifest mirrors the standard compose-file shape: a map of services
//! plus top-level named volume and network declarations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root structure of a skiff.yml manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Services to be deployed
    pub services: HashMap<String, ServiceDef>,

    /// Named volumes
    #[serde(default)]
    pub volumes: HashMap<String, VolumeDefinition>,

    /// Networks
    #[serde(default)]
    pub networks: HashMap<String, NetworkDefinition>,
}

/// A service definition in the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDef {
    /// Prebuilt image to use
    #[serde(default)]
    pub image: Option<String>,

    /// Build context (alternative to `image`)
    #[serde(default)]
    pub build: Option<BuildDef>,

    /// Environment variables
    #[serde(default)]
    pub environment: Environment,

    /// Port mappings (e.g., ["8080:80", "53:53/udp"])
    #[serde(default)]
    pub ports: Vec<String>,

    /// Services this service depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Volume mounts (e.g., ["db-data:/var/lib/db", "./conf:/etc/conf:ro"])
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Networks to join
    #[serde(default)]
    pub networks: Vec<String>,
}

/// Build configuration: a bare context path or the full form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildDef {
    /// Shorthand: just the context directory
    Path(String),

    /// Full form with explicit dockerfile
    Full {
        context: String,
        #[serde(default)]
        dockerfile: Option<String>,
    },
}

/// Environment variables can be specified as a map or a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Environment {
    /// Environment as key-value map
    Map(HashMap<String, String>),
    /// Environment as list of KEY=value strings
    List(Vec<String>),
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Map(HashMap::new())
    }
}

impl Environment {
    /// Convert to a map regardless of the input form. List entries without
    /// an '=' are dropped.
    pub fn to_map(&self) -> HashMap<String, String> {
        match self {
            Environment::Map(map) => map.clone(),
            Environment::List(list) => list
                .iter()
                .filter_map(|entry| {
                    entry
                        .split_once('=')
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                })
                .collect(),
        }
    }
}

/// Named volume declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeDefinition {
    /// Whether the volume survives `down`. Scratch volumes set this false.
    #[serde(default = "default_true")]
    pub persistent: bool,
}

impl Default for VolumeDefinition {
    fn default() -> Self {
        Self { persistent: true }
    }
}

/// Network declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDefinition {
    /// Isolation mode ("bridge" when omitted)
    #[serde(default)]
    pub mode: crate::types::NetworkMode,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_to_map_from_list() {
        let env = Environment::List(vec![
            "ENV=production".to_string(),
            "EMPTY=".to_string(),
            "MALFORMED".to_string(),
        ]);
        let map = env.to_map();
        assert_eq!(map.get("ENV"), Some(&"production".to_string()));
        assert_eq!(map.get("EMPTY"), Some(&"".to_string()));
        assert!(!map.contains_key("MALFORMED"));
    }

    #[test]
    fn test_environment_to_map_from_map() {
        let mut expected = HashMap::new();
        expected.insert("ENV".to_string(), "production".to_string());
        let env = Environment::Map(expected.clone());
        assert_eq!(env.to_map(), expected);
    }

    #[test]
    fn test_volume_definition_defaults_persistent() {
        let def: VolumeDefinition = serde_yaml::from_str("{}").unwrap();
        assert!(def.persistent);

        let scratch: VolumeDefinition = serde_yaml::from_str("persistent: false").unwrap();
        assert!(!scratch.persistent);
    }
}
