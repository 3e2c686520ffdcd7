//! State management with SQLite persistence.
//!
//! The StateManager holds everything that must survive a process exit:
//! - Deployed stacks and their per-service container handles
//! - Named volumes and their backing paths
//! - Networks
//!
//! Per-service RunState during an `up`/`down` is in-memory and owned by the
//! lifecycle controller; only its durable projection (the `status` column)
//! lives here.

use crate::error::{Result, SkiffError};
use crate::types::{Network, NetworkMode, ServiceRecord, StackRecord, Volume};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::{info, instrument};

pub mod migrations;


/// State manager for persistent storage.
#[derive(Clone)]
pub struct StateManager {
    pool: SqlitePool,
}

impl StateManager {
    /// Create a new StateManager with an in-memory database (for tests).
    pub async fn new_in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    /// Create a new StateManager with a database at the specified path.
    #[instrument(skip(db_path))]
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Initializing state manager at {:?}", db_path);

        if db_path != Path::new(":memory:") {
            if let Some(parent) = db_path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    SkiffError::InvalidConfig {
                        reason: format!("Failed to create directory {}: {}", parent.display(), e),
                    }
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_path.to_str().ok_or_else(|| {
            SkiffError::InvalidConfig { reason: "Invalid database path".to_string() }
        })?)
        .map_err(|e| SkiffError::DatabaseError(e.to_string()))?
        .create_if_missing(true);

        // A pooled :memory: database would give every connection its own
        // empty database; keep it on a single connection.
        let max_connections = if db_path == Path::new(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        let manager = Self { pool };
        migrations::run(&manager.pool).await?;

        info!("State manager initialized");
        Ok(manager)
    }

    // ========================
    // Stack Operations
    // ========================

    /// Insert a stack and its service rows, plus resource associations.
    #[instrument(skip(self, record, volumes, networks), fields(stack = %record.name))]
    pub async fn insert_stack(
        &self,
        record: &StackRecord,
        volumes: &[String],
        networks: &[String],
    ) -> Result<()> {
        sqlx::query("INSERT INTO stacks (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&record.id)
            .bind(&record.name)
            .bind(to_unix(record.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        for service in &record.services {
            sqlx::query(
                r#"
                INSERT INTO stack_services (stack_name, service_name, container_id, status, start_order)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.name)
            .bind(&service.name)
            .bind(&service.container_id)
            .bind(&service.status)
            .bind(service.start_order)
            .execute(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        }

        for volume in volumes {
            sqlx::query(
                "INSERT OR IGNORE INTO stack_volumes (stack_name, volume_name) VALUES (?, ?)",
            )
            .bind(&record.name)
            .bind(volume)
            .execute(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        }

        for network in networks {
            sqlx::query(
                "INSERT OR IGNORE INTO stack_networks (stack_name, network_name) VALUES (?, ?)",
            )
            .bind(&record.name)
            .bind(network)
            .execute(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        }

        Ok(())
    }

    /// Get a stack by name, services ordered by start order.
    #[instrument(skip(self), fields(stack = %name))]
    pub async fn get_stack(&self, name: &str) -> Result<StackRecord> {
        let row = sqlx::query("SELECT * FROM stacks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?
            .ok_or_else(|| SkiffError::StackNotFound { stack: name.to_string() })?;

        let id: String = row.try_get("id").map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        let created_at: i64 =
            row.try_get("created_at").map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        let service_rows = sqlx::query(
            "SELECT * FROM stack_services WHERE stack_name = ? ORDER BY start_order ASC",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        let mut services = Vec::with_capacity(service_rows.len());
        for row in service_rows {
            services.push(ServiceRecord {
                name: row
                    .try_get("service_name")
                    .map_err(|e| SkiffError::DatabaseError(e.to_string()))?,
                container_id: row
                    .try_get("container_id")
                    .map_err(|e| SkiffError::DatabaseError(e.to_string()))?,
                status: row
                    .try_get("status")
                    .map_err(|e| SkiffError::DatabaseError(e.to_string()))?,
                start_order: row
                    .try_get("start_order")
                    .map_err(|e| SkiffError::DatabaseError(e.to_string()))?,
            });
        }

        Ok(StackRecord {
            id,
            name: name.to_string(),
            services,
            created_at: from_unix(created_at),
        })
    }

    /// List all stacks.
    pub async fn list_stacks(&self) -> Result<Vec<StackRecord>> {
        let rows = sqlx::query("SELECT name FROM stacks ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        let mut stacks = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String =
                row.try_get("name").map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
            stacks.push(self.get_stack(&name).await?);
        }
        Ok(stacks)
    }

    /// Update one service's container id and status.
    #[instrument(skip(self), fields(stack = %stack, service = %service))]
    pub async fn update_service(
        &self,
        stack: &str,
        service: &str,
        container_id: Option<&str>,
        status: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE stack_services SET container_id = ?, status = ? WHERE stack_name = ? AND service_name = ?",
        )
        .bind(container_id)
        .bind(status)
        .bind(stack)
        .bind(service)
        .execute(&self.pool)
        .await
        .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Volume names associated with a stack.
    pub async fn stack_volumes(&self, stack: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT volume_name FROM stack_volumes WHERE stack_name = ? ORDER BY volume_name",
        )
        .bind(stack)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                row.try_get("volume_name").map_err(|e| SkiffError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    /// Network names associated with a stack.
    pub async fn stack_networks(&self, stack: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT network_name FROM stack_networks WHERE stack_name = ? ORDER BY network_name",
        )
        .bind(stack)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                row.try_get("network_name").map_err(|e| SkiffError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    /// Delete a stack, its service rows, and its resource associations.
    /// Volumes and networks themselves are owned by the resource managers.
    #[instrument(skip(self), fields(stack = %name))]
    pub async fn delete_stack(&self, name: &str) -> Result<()> {
        for table in ["stack_services", "stack_volumes", "stack_networks"] {
            sqlx::query(&format!("DELETE FROM {} WHERE stack_name = ?", table))
                .bind(name)
                .execute(&self.pool)
                .await
                .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        }

        sqlx::query("DELETE FROM stacks WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    // ========================
    // Volume Operations
    // ========================

    /// Insert a new volume.
    #[instrument(skip(self, volume), fields(volume = %volume.name))]
    pub async fn insert_volume(&self, volume: &Volume) -> Result<()> {
        sqlx::query(
            "INSERT INTO volumes (id, name, path, persistent, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&volume.id)
        .bind(&volume.name)
        .bind(volume.path.to_string_lossy().to_string())
        .bind(volume.persistent as i64)
        .bind(to_unix(volume.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Get a volume by name.
    pub async fn get_volume(&self, name: &str) -> Result<Option<Volume>> {
        let row = sqlx::query("SELECT * FROM volumes WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        row.map(row_to_volume).transpose()
    }

    /// List all volumes.
    pub async fn list_volumes(&self) -> Result<Vec<Volume>> {
        let rows = sqlx::query("SELECT * FROM volumes ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(row_to_volume).collect()
    }

    /// Delete a volume row.
    #[instrument(skip(self), fields(volume = %name))]
    pub async fn delete_volume(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM volumes WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    // ========================
    // Network Operations
    // ========================

    /// Insert a new network.
    #[instrument(skip(self, network), fields(network = %network.name))]
    pub async fn insert_network(&self, network: &Network) -> Result<()> {
        sqlx::query("INSERT INTO networks (id, name, mode, created_at) VALUES (?, ?, ?, ?)")
            .bind(&network.id)
            .bind(&network.name)
            .bind(network.mode.to_string())
            .bind(to_unix(network.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Get a network by name.
    pub async fn get_network(&self, name: &str) -> Result<Option<Network>> {
        let row = sqlx::query("SELECT * FROM networks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        row.map(row_to_network).transpose()
    }

    /// List all networks.
    pub async fn list_networks(&self) -> Result<Vec<Network>> {
        let rows = sqlx::query("SELECT * FROM networks ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(row_to_network).collect()
    }

    /// Delete a network row.
    #[instrument(skip(self), fields(network = %name))]
    pub async fn delete_network(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM networks WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

fn row_to_volume(row: sqlx::sqlite::SqliteRow) -> Result<Volume> {
    let path: String = row.try_get("path").map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
    let persistent: i64 =
        row.try_get("persistent").map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
    let created_at: i64 =
        row.try_get("created_at").map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

    Ok(Volume {
        id: row.try_get("id").map_err(|e| SkiffError::DatabaseError(e.to_string()))?,
        name: row.try_get("name").map_err(|e| SkiffError::DatabaseError(e.to_string()))?,
        path: path.into(),
        persistent: persistent != 0,
        created_at: from_unix(created_at),
    })
}

fn row_to_network(row: sqlx::sqlite::SqliteRow) -> Result<Network> {
    let mode: String = row.try_get("mode").map_err(|e| SkiffError::DatabaseError(e.to_string()))?;
    let created_at: i64 =
        row.try_get("created_at").map_err(|e| SkiffError::DatabaseError(e.to_string()))?;

    Ok(Network {
        id: row.try_get("id").map_err(|e| SkiffError::DatabaseError(e.to_string()))?,
        name: row.try_get("name").map_err(|e| SkiffError::DatabaseError(e.to_string()))?,
        mode: mode.parse::<NetworkMode>().map_err(SkiffError::DatabaseError)?,
        created_at: from_unix(created_at),
    })
}

fn to_unix(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn from_unix(secs: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}
