//! Container runtime abstraction.
//!
//! SKIFF never reimplements a container runtime. Everything it needs from
//! one goes through the narrow [`ContainerRuntime`] seam:
//! build an image, run a container, stop it, remove it, probe readiness.
//!
//! Implementations:
//! - [`EngineRuntime`]: invokes an installed engine binary (docker, podman)
//! - [`StubRuntime`]: in-memory, used by the test suite

use crate::error::Result;
use crate::types::{BuildSource, ContainerHandle, LaunchSpec};
use async_trait::async_trait;
use std::time::Duration;

mod engine;
mod factory;
mod stub;

pub use engine::EngineRuntime;
pub use factory::RuntimeFactory;
pub use stub::StubRuntime;

/// Reference to an image the runtime can run.
pub type ImageRef = String;

/// The contract SKIFF consumes from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Build an image from a local context, returning its reference.
    ///
    /// `no_cache` forces a rebuild ignoring the engine's layer cache.
    async fn build(&self, source: &BuildSource, no_cache: bool) -> Result<ImageRef>;

    /// Launch a container from an image.
    async fn run(&self, image: &ImageRef, spec: &LaunchSpec) -> Result<ContainerHandle>;

    /// Stop a running container gracefully, within `timeout`.
    async fn stop(&self, handle: &ContainerHandle, timeout: Duration) -> Result<()>;

    /// Remove a stopped container's resources.
    async fn remove(&self, handle: &ContainerHandle) -> Result<()>;

    /// Probe whether the container is ready for dependents to start.
    ///
    /// Readiness is defined by the service itself (the engine's health
    /// status when configured, plain liveness otherwise).
    async fn readiness(&self, handle: &ContainerHandle) -> Result<bool>;

    /// Runtime name, for logging.
    fn name(&self) -> &str;
}
