//! Volume and network managers.
//!
//! Both managers implement create-or-reuse keyed by name: `ensure` returns
//! the existing resource when one is already registered, otherwise creates
//! and registers it. Nothing here is removed by normal teardown; `remove`
//! is the only destroy path.

use crate::error::{Result, SkiffError};
use crate::state::StateManager;
use crate::types::{Network, NetworkMode, Volume};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, instrument};
use uuid::Uuid;

/// Manager for named persistent volumes.
///
/// A volume's backing directory lives under `root` and survives lifecycle
/// start/stop cycles; only [`VolumeManager::remove`] deletes it.
pub struct VolumeManager {
    state: Arc<StateManager>,
    root: PathBuf,
}

impl VolumeManager {
    pub fn new(state: Arc<StateManager>, root: PathBuf) -> Self {
        Self { state, root }
    }

    /// Create-or-reuse a volume by name.
    #[instrument(skip(self))]
    pub async fn ensure(&self, name: &str, persistent: bool) -> Result<Volume> {
        if let Some(existing) = self.state.get_volume(name).await? {
            return Ok(existing);
        }

        let path = self.root.join(name);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| SkiffError::IoError { path: path.clone(), source: e })?;

        let volume = Volume {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            path,
            persistent,
            created_at: SystemTime::now(),
        };
        self.state.insert_volume(&volume).await?;

        info!(volume = %name, path = %volume.path.display(), "Volume created");
        Ok(volume)
    }

    /// Explicitly destroy a volume and its backing storage.
    #[instrument(skip(self))]
    pub async fn remove(&self, name: &str) -> Result<()> {
        let volume = self
            .state
            .get_volume(name)
            .await?
            .ok_or_else(|| SkiffError::VolumeNotFound { volume: name.to_string() })?;

        if volume.path.exists() {
            tokio::fs::remove_dir_all(&volume.path)
                .await
                .map_err(|e| SkiffError::IoError { path: volume.path.clone(), source: e })?;
        }
        self.state.delete_volume(name).await?;

        info!(volume = %name, "Volume removed");
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<Volume>> {
        self.state.get_volume(name).await
    }

    pub async fn list(&self) -> Result<Vec<Volume>> {
        self.state.list_volumes().await
    }
}

/// Manager for isolated networks.
pub struct NetworkManager {
    state: Arc<StateManager>,
}

impl NetworkManager {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state }
    }

    /// Create-or-reuse a network by name. An existing network keeps its
    /// original mode.
    #[instrument(skip(self))]
    pub async fn ensure(&self, name: &str, mode: NetworkMode) -> Result<Network> {
        if let Some(existing) = self.state.get_network(name).await? {
            return Ok(existing);
        }

        let network = Network {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            mode,
            created_at: SystemTime::now(),
        };
        self.state.insert_network(&network).await?;

        info!(network = %name, mode = %mode, "Network created");
        Ok(network)
    }

    /// Explicitly destroy a network.
    #[instrument(skip(self))]
    pub async fn remove(&self, name: &str) -> Result<()> {
        self.state
            .get_network(name)
            .await?
            .ok_or_else(|| SkiffError::NetworkNotFound { network: name.to_string() })?;

        self.state.delete_network(name).await?;
        info!(network = %name, "Network removed");
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<Network>> {
        self.state.get_network(name).await
    }

    pub async fn list(&self) -> Result<Vec<Network>> {
        self.state.list_networks().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn volume_manager(temp: &tempfile::TempDir) -> VolumeManager {
        let state = Arc::new(StateManager::new_in_memory().await.unwrap());
        VolumeManager::new(state, temp.path().join("volumes"))
    }

    #[tokio::test]
    async fn test_ensure_volume_is_idempotent() {
        let temp = tempfile::TempDir::new().unwrap();
        let volumes = volume_manager(&temp).await;

        let first = volumes.ensure("db-data", true).await.unwrap();
        assert!(first.path.exists());

        let second = volumes.ensure("db-data", true).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(volumes.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_volume_backing_storage_survives_until_removed() {
        let temp = tempfile::TempDir::new().unwrap();
        let volumes = volume_manager(&temp).await;

        let volume = volumes.ensure("db-data", true).await.unwrap();
        let marker = volume.path.join("data.txt");
        tokio::fs::write(&marker, "rows").await.unwrap();

        // Re-ensure simulates the next up cycle; contents must survive.
        let again = volumes.ensure("db-data", true).await.unwrap();
        assert_eq!(again.path, volume.path);
        assert!(marker.exists());

        volumes.remove("db-data").await.unwrap();
        assert!(!marker.exists());
        assert!(volumes.get("db-data").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_missing_volume_errors() {
        let temp = tempfile::TempDir::new().unwrap();
        let volumes = volume_manager(&temp).await;
        let err = volumes.remove("ghost").await.unwrap_err();
        assert!(matches!(err, SkiffError::VolumeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_ensure_network_is_idempotent() {
        let state = Arc::new(StateManager::new_in_memory().await.unwrap());
        let networks = NetworkManager::new(state);

        let first = networks.ensure("demo_default", NetworkMode::Bridge).await.unwrap();
        let second = networks.ensure("demo_default", NetworkMode::None).await.unwrap();

        // Existing network keeps its original mode.
        assert_eq!(first.id, second.id);
        assert_eq!(second.mode, NetworkMode::Bridge);

        networks.remove("demo_default").await.unwrap();
        assert!(networks.get("demo_default").await.unwrap().is_none());
    }
}
