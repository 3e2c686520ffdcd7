//! Manifest loader.
//!
//! Parses a manifest plus its environment source into a validated
//! [`StackSpec`]. All schema checks and variable substitution happen here,
//! before the lifecycle controller performs any side effect.

use super::interpolate::{self, InterpolateError};
use super::types::{BuildDef, ManifestFile, ServiceDef};
use crate::error::{Result, SkiffError};
use crate::types::{
    BuildSource, NetworkSpec, PortMapping, Protocol, ServiceSource, ServiceSpec, StackSpec,
    VolumeMount, VolumeSpec,
};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Loader for skiff.yml manifests.
pub struct ManifestLoader;

impl ManifestLoader {
    /// Load a manifest file and its optional environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The manifest or env file cannot be read
    /// - The YAML does not match the manifest schema
    /// - A service defines neither `image` nor `build`
    /// - A `${VAR}` reference is not defined by the environment source
    #[instrument(skip(manifest_path, env_path))]
    pub fn load(
        manifest_path: impl AsRef<Path>,
        env_path: Option<&Path>,
        stack_name: Option<String>,
    ) -> Result<StackSpec> {
        let manifest_path = manifest_path.as_ref();
        info!("Loading manifest from {:?}", manifest_path);

        let content =
            std::fs::read_to_string(manifest_path).map_err(|e| SkiffError::FileRead {
                path: manifest_path.to_string_lossy().to_string(),
                source: e,
            })?;

        let env = match env_path {
            Some(path) => super::env_file::load(path)?,
            None => HashMap::new(),
        };

        let name = stack_name
            .or_else(|| {
                manifest_path
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
                    .filter(|n| !n.is_empty())
                    .map(|n| n.to_string())
            })
            .unwrap_or_else(|| "default".to_string());

        Self::parse(&content, &env, &name)
    }

    /// Parse manifest content against an environment map.
    #[instrument(skip(content, env), fields(stack = %name))]
    pub fn parse(content: &str, env: &HashMap<String, String>, name: &str) -> Result<StackSpec> {
        let manifest: ManifestFile = serde_yaml::from_str(content)
            .map_err(|e| SkiffError::Schema { reason: e.to_string() })?;

        Self::validate(&manifest)?;

        let mut services: Vec<ServiceSpec> = manifest
            .services
            .iter()
            .map(|(service_name, def)| Self::convert_service(service_name, def, env))
            .collect::<Result<_>>()?;

        // Deterministic ordering; the resolver re-orders by dependencies.
        services.sort_by(|a, b| a.name.cmp(&b.name));

        let volumes = Self::collect_volumes(&manifest, &services);
        let networks = Self::collect_networks(&manifest);

        info!(
            services = services.len(),
            volumes = volumes.len(),
            networks = networks.len(),
            "Manifest loaded"
        );

        Ok(StackSpec { name: name.to_string(), services, volumes, networks })
    }

    /// Schema validation: the checks serde cannot express.
    fn validate(manifest: &ManifestFile) -> Result<()> {
        if manifest.services.is_empty() {
            return Err(SkiffError::Schema { reason: "No services defined".to_string() });
        }

        for (name, service) in &manifest.services {
            let has_image = service.image.as_deref().is_some_and(|i| !i.is_empty());
            if !has_image && service.build.is_none() {
                return Err(SkiffError::Schema {
                    reason: format!("Service '{}' must define either image or build", name),
                });
            }
        }

        Ok(())
    }

    /// Convert one manifest service into a resolved ServiceSpec.
    fn convert_service(
        name: &str,
        def: &ServiceDef,
        env: &HashMap<String, String>,
    ) -> Result<ServiceSpec> {
        let environment = Self::resolve_environment(name, def, env)?;
        let ports = Self::parse_ports(name, &def.ports)?;
        let volumes = Self::parse_mounts(name, &def.volumes);

        let source = match (&def.image, &def.build) {
            (_, Some(build)) => ServiceSource::Build(Self::convert_build(name, build)),
            (Some(image), None) => ServiceSource::Image(image.clone()),
            // validate() rejects this shape before conversion
            (None, None) => {
                return Err(SkiffError::Schema {
                    reason: format!("Service '{}' must define either image or build", name),
                })
            }
        };

        Ok(ServiceSpec {
            name: name.to_string(),
            source,
            environment,
            ports,
            depends_on: def.depends_on.clone(),
            networks: def.networks.clone(),
            volumes,
        })
    }

    /// Two-pass `${VAR}` resolution over a service's environment values.
    ///
    /// Pass one scans every value so the whole reference set is checked
    /// against the source map; pass two substitutes. Any miss aborts the
    /// load before a single resource is touched.
    fn resolve_environment(
        service: &str,
        def: &ServiceDef,
        env: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        let raw = def.environment.to_map();

        for (key, value) in &raw {
            let referenced = interpolate::scan(value).map_err(|e| {
                Self::interpolate_error(service, key, e)
            })?;
            for var in referenced {
                if !env.contains_key(&var) {
                    return Err(SkiffError::UndefinedVariable {
                        service: service.to_string(),
                        key: key.clone(),
                        var,
                    });
                }
            }
        }

        raw.into_iter()
            .map(|(key, value)| {
                let substituted = interpolate::substitute(&value, env)
                    .map_err(|e| Self::interpolate_error(service, &key, e))?;
                Ok((key, substituted))
            })
            .collect()
    }

    fn interpolate_error(service: &str, key: &str, err: InterpolateError) -> SkiffError {
        match err {
            InterpolateError::Undefined(var) => SkiffError::UndefinedVariable {
                service: service.to_string(),
                key: key.to_string(),
                var,
            },
            InterpolateError::Unterminated => SkiffError::Validation {
                reason: format!(
                    "Service '{}' key '{}': unterminated ${{...}} placeholder",
                    service, key
                ),
            },
        }
    }

    fn convert_build(service: &str, build: &BuildDef) -> BuildSource {
        let (context, dockerfile) = match build {
            BuildDef::Path(path) => (path.clone(), None),
            BuildDef::Full { context, dockerfile } => (context.clone(), dockerfile.clone()),
        };
        BuildSource {
            context: context.into(),
            dockerfile,
            tag: format!("skiff/{}:latest", service),
        }
    }

    /// Parse port mappings from compose shorthand.
    ///
    /// Accepts "HOST:CONTAINER", "HOST:CONTAINER/udp", and the single-port
    /// form "PORT" which maps the same port on both sides.
    fn parse_ports(service: &str, ports: &[String]) -> Result<Vec<PortMapping>> {
        let mut mappings = Vec::new();

        for spec in ports {
            let (ports_part, protocol) = match spec.split_once('/') {
                Some((p, proto)) => (p, Self::parse_protocol(proto)),
                None => (spec.as_str(), Protocol::Tcp),
            };

            let (host, container) = match ports_part.split_once(':') {
                Some((h, c)) => (h, c),
                None => (ports_part, ports_part),
            };

            match (host.parse::<u16>(), container.parse::<u16>()) {
                (Ok(host_port), Ok(container_port)) => {
                    mappings.push(PortMapping { host_port, container_port, protocol });
                }
                _ => {
                    return Err(SkiffError::Validation {
                        reason: format!("Service '{}': invalid port spec '{}'", service, spec),
                    })
                }
            }
        }

        Ok(mappings)
    }

    fn parse_protocol(s: &str) -> Protocol {
        match s.to_lowercase().as_str() {
            "udp" => Protocol::Udp,
            "tcp" => Protocol::Tcp,
            other => {
                warn!("Unknown protocol '{}', defaulting to tcp", other);
                Protocol::Tcp
            }
        }
    }

    /// Parse volume mount shorthand ("SOURCE:TARGET[:ro]").
    fn parse_mounts(service: &str, specs: &[String]) -> Vec<VolumeMount> {
        specs
            .iter()
            .filter_map(|spec| {
                let parts: Vec<&str> = spec.split(':').collect();
                if parts.len() >= 2 {
                    Some(VolumeMount {
                        source: parts[0].to_string(),
                        target: parts[1].to_string(),
                        readonly: parts.get(2) == Some(&"ro"),
                    })
                } else {
                    warn!("Service '{}': skipping invalid volume spec '{}'", service, spec);
                    None
                }
            })
            .collect()
    }

    /// Collect named volumes: everything declared at the top level plus any
    /// named mount a service references implicitly.
    fn collect_volumes(manifest: &ManifestFile, services: &[ServiceSpec]) -> Vec<VolumeSpec> {
        let mut volumes: Vec<VolumeSpec> = manifest
            .volumes
            .iter()
            .map(|(name, def)| VolumeSpec { name: name.clone(), persistent: def.persistent })
            .collect();

        for service in services {
            for mount in &service.volumes {
                if mount.is_named() && !volumes.iter().any(|v| v.name == mount.source) {
                    volumes.push(VolumeSpec { name: mount.source.clone(), persistent: true });
                }
            }
        }

        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        volumes
    }

    fn collect_networks(manifest: &ManifestFile) -> Vec<NetworkSpec> {
        let mut networks: Vec<NetworkSpec> = manifest
            .networks
            .iter()
            .map(|(name, def)| NetworkSpec { name: name.clone(), mode: def.mode })
            .collect();
        networks.sort_by(|a, b| a.name.cmp(&b.name));
        networks
    }
}
