//! Engine-backed runtime.
//!
//! Drives an installed container engine binary (docker, podman) through its
//! CLI. One short-lived process per operation; stdout is the result,
//! stderr becomes the error message.

use super::{ContainerRuntime, ImageRef};
use crate::error::{Result, SkiffError};
use crate::types::{BuildSource, ContainerHandle, LaunchSpec};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Container runtime invoking an external engine binary.
pub struct EngineRuntime {
    bin: String,
}

impl EngineRuntime {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Run one engine command, returning trimmed stdout.
    async fn exec(&self, args: &[&str]) -> Result<String> {
        debug!(bin = %self.bin, ?args, "Invoking engine");

        let output = tokio::process::Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .map_err(|e| SkiffError::RuntimeUnavailable {
                reason: format!("failed to invoke '{}': {}", self.bin, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SkiffError::EngineCommand {
                command: format!("{} {}", self.bin, args.join(" ")),
                reason: if stderr.is_empty() {
                    format!("exit status {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Create-or-reuse a network on the engine side. The engine rejects
    /// duplicate names; that rejection is treated as reuse.
    async fn ensure_network(&self, name: &str) -> Result<()> {
        match self.exec(&["network", "create", name]).await {
            Ok(_) => Ok(()),
            Err(SkiffError::EngineCommand { reason, .. }) if reason.contains("already exists") => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ContainerRuntime for EngineRuntime {
    #[instrument(skip(self, source), fields(tag = %source.tag))]
    async fn build(&self, source: &BuildSource, no_cache: bool) -> Result<ImageRef> {
        let context = source.context.to_string_lossy().to_string();
        let mut args: Vec<&str> = vec!["build", "-t", source.tag.as_str()];
        if no_cache {
            args.push("--no-cache");
        }
        if let Some(dockerfile) = &source.dockerfile {
            args.push("-f");
            args.push(dockerfile.as_str());
        }
        args.push(context.as_str());

        self.exec(&args).await?;
        Ok(source.tag.clone())
    }

    #[instrument(skip(self, spec), fields(name = %spec.name))]
    async fn run(&self, image: &ImageRef, spec: &LaunchSpec) -> Result<ContainerHandle> {
        if let Some(network) = &spec.network {
            self.ensure_network(network).await?;
        }

        let mut args: Vec<String> =
            vec!["run".into(), "-d".into(), "--name".into(), spec.name.clone()];

        if let Some(network) = &spec.network {
            args.push("--network".into());
            args.push(network.clone());
        }
        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{}={}", key, value));
        }
        for port in &spec.ports {
            args.push("-p".into());
            args.push(format!(
                "{}:{}/{}",
                port.host_port, port.container_port, port.protocol
            ));
        }
        for bind in &spec.binds {
            args.push("-v".into());
            let mut mapping =
                format!("{}:{}", bind.source.to_string_lossy(), bind.target);
            if bind.readonly {
                mapping.push_str(":ro");
            }
            args.push(mapping);
        }
        args.push(image.clone());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = self.exec(&arg_refs).await?;

        Ok(ContainerHandle { id, name: spec.name.clone() })
    }

    #[instrument(skip(self), fields(id = %handle.id))]
    async fn stop(&self, handle: &ContainerHandle, timeout: Duration) -> Result<()> {
        let secs = timeout.as_secs().to_string();
        self.exec(&["stop", "-t", secs.as_str(), handle.id.as_str()]).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %handle.id))]
    async fn remove(&self, handle: &ContainerHandle) -> Result<()> {
        self.exec(&["rm", "-f", handle.id.as_str()]).await?;
        Ok(())
    }

    async fn readiness(&self, handle: &ContainerHandle) -> Result<bool> {
        // Health status when the image defines a healthcheck, otherwise
        // running state stands in for readiness.
        let state = self
            .exec(&[
                "inspect",
                "-f",
                "{{if .State.Health}}{{.State.Health.Status}}{{else}}{{.State.Status}}{{end}}",
                handle.id.as_str(),
            ])
            .await?;

        Ok(matches!(state.as_str(), "healthy" | "running"))
    }

    fn name(&self) -> &str {
        &self.bin
    }
}
