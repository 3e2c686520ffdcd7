//! In-memory runtime for the test suite.
//!
//! Simulates the container runtime without spawning processes: containers
//! are map entries, volume contents are string lists keyed by volume name.
//! The volume store outlives stop/remove, which is what lets tests assert
//! that data written between lifecycle cycles survives.

use super::{ContainerRuntime, ImageRef};
use crate::error::{Result, SkiffError};
use crate::types::{BuildSource, ContainerHandle, LaunchSpec};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
struct StubContainer {
    name: String,
    running: bool,
}

/// Scriptable in-memory container runtime.
#[derive(Default)]
pub struct StubRuntime {
    containers: Mutex<HashMap<String, StubContainer>>,
    /// Volume name -> entries. Survives container stop/remove.
    volume_data: Mutex<HashMap<String, Vec<String>>>,
    /// Container names whose `run` fails.
    fail_run: Mutex<HashSet<String>>,
    /// Container names whose readiness probe never succeeds.
    hold_ready: Mutex<HashSet<String>>,
    /// Names in the order `run` was called, for ordering assertions.
    launch_log: Mutex<Vec<String>>,
    built: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl StubRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `run` fail for the given container name.
    pub fn fail_run(&self, name: &str) {
        self.fail_run.lock().unwrap().insert(name.to_string());
    }

    /// Make the readiness probe never succeed for the given container name.
    pub fn hold_ready(&self, name: &str) {
        self.hold_ready.lock().unwrap().insert(name.to_string());
    }

    /// Append an entry to a volume's backing store.
    pub fn write_volume(&self, volume: &str, entry: &str) {
        self.volume_data
            .lock()
            .unwrap()
            .entry(volume.to_string())
            .or_default()
            .push(entry.to_string());
    }

    /// Read a volume's backing store.
    pub fn read_volume(&self, volume: &str) -> Vec<String> {
        self.volume_data.lock().unwrap().get(volume).cloned().unwrap_or_default()
    }

    /// Drop a volume's backing store (the explicit-destroy path).
    pub fn destroy_volume(&self, volume: &str) {
        self.volume_data.lock().unwrap().remove(volume);
    }

    /// Container names in launch order.
    pub fn launched(&self) -> Vec<String> {
        self.launch_log.lock().unwrap().clone()
    }

    /// Image tags built so far.
    pub fn built_images(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }

    /// Whether a container with this name currently exists.
    pub fn exists(&self, name: &str) -> bool {
        self.containers.lock().unwrap().values().any(|c| c.name == name)
    }

    /// Whether a container with this name is currently running.
    pub fn is_running(&self, name: &str) -> bool {
        self.containers
            .lock()
            .unwrap()
            .values()
            .any(|c| c.name == name && c.running)
    }
}

#[async_trait]
impl ContainerRuntime for StubRuntime {
    async fn build(&self, source: &BuildSource, _no_cache: bool) -> Result<ImageRef> {
        self.built.lock().unwrap().push(source.tag.clone());
        Ok(source.tag.clone())
    }

    async fn run(&self, _image: &ImageRef, spec: &LaunchSpec) -> Result<ContainerHandle> {
        if self.fail_run.lock().unwrap().contains(&spec.name) {
            return Err(SkiffError::EngineCommand {
                command: format!("run {}", spec.name),
                reason: "simulated start failure".to_string(),
            });
        }

        let id = format!("stub-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.containers
            .lock()
            .unwrap()
            .insert(id.clone(), StubContainer { name: spec.name.clone(), running: true });
        self.launch_log.lock().unwrap().push(spec.name.clone());

        Ok(ContainerHandle { id, name: spec.name.clone() })
    }

    async fn stop(&self, handle: &ContainerHandle, _timeout: Duration) -> Result<()> {
        if let Some(container) = self.containers.lock().unwrap().get_mut(&handle.id) {
            container.running = false;
        }
        Ok(())
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<()> {
        self.containers.lock().unwrap().remove(&handle.id);
        Ok(())
    }

    async fn readiness(&self, handle: &ContainerHandle) -> Result<bool> {
        let containers = self.containers.lock().unwrap();
        let Some(container) = containers.get(&handle.id) else {
            return Ok(false);
        };
        if self.hold_ready.lock().unwrap().contains(&container.name) {
            return Ok(false);
        }
        Ok(container.running)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn launch(name: &str) -> LaunchSpec {
        LaunchSpec {
            name: name.to_string(),
            env: HashMap::new(),
            ports: vec![],
            network: None,
            binds: vec![],
        }
    }

    #[tokio::test]
    async fn test_volume_store_survives_container_removal() {
        let runtime = StubRuntime::new();
        let handle = runtime.run(&"img".to_string(), &launch("db")).await.unwrap();

        runtime.write_volume("db-data", "row1");
        runtime.stop(&handle, Duration::from_secs(1)).await.unwrap();
        runtime.remove(&handle).await.unwrap();

        assert!(!runtime.exists("db"));
        assert_eq!(runtime.read_volume("db-data"), vec!["row1".to_string()]);

        runtime.destroy_volume("db-data");
        assert!(runtime.read_volume("db-data").is_empty());
    }

    #[tokio::test]
    async fn test_scripted_run_failure() {
        let runtime = StubRuntime::new();
        runtime.fail_run("db");
        let err = runtime.run(&"img".to_string(), &launch("db")).await.unwrap_err();
        assert!(matches!(err, SkiffError::EngineCommand { .. }));
        assert!(runtime.launched().is_empty());
    }

    #[tokio::test]
    async fn test_readiness_tracks_running_state() {
        let runtime = StubRuntime::new();
        let handle = runtime.run(&"img".to_string(), &launch("db")).await.unwrap();
        assert!(runtime.readiness(&handle).await.unwrap());

        runtime.stop(&handle, Duration::from_secs(1)).await.unwrap();
        assert!(!runtime.readiness(&handle).await.unwrap());
    }
}
