//! Domain types shared across SKIFF.

pub mod network;
pub mod service;
pub mod stack;
pub mod volume;

pub use network::{Network, NetworkMode, PortMapping, Protocol};
pub use service::{
    BuildSource, ContainerHandle, LaunchSpec, RunState, ServiceSource, ServiceSpec,
};
pub use stack::{NetworkSpec, ServiceRecord, StackRecord, StackSpec, VolumeSpec};
pub use volume::{Bind, Volume, VolumeMount};
