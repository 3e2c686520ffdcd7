//! Database migrations.

use crate::error::{Result, SkiffError};
use sqlx::SqlitePool;
use tracing::{info, instrument};

const SCHEMA_VERSION: i64 = 2;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    if current_version < 2 {
        migrate_to_v2(pool).await?;
    }

    Ok(())
}

async fn set_version(pool: &SqlitePool, version: i64) -> Result<()> {
    sqlx::query("DELETE FROM schema_version")
        .execute(pool)
        .await
        .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await
        .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    Ok(())
}

#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 1");

    // Stacks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stacks (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    // Per-service deployment state, ordered for reverse teardown
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stack_services (
            stack_name TEXT NOT NULL,
            service_name TEXT NOT NULL,
            container_id TEXT,
            status TEXT NOT NULL,
            start_order INTEGER NOT NULL,
            PRIMARY KEY (stack_name, service_name)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_stack_services_order ON stack_services(stack_name, start_order)",
    )
    .execute(pool)
    .await
    .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    // Volumes table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS volumes (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            path TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    // Networks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS networks (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            mode TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    // Stack-volume and stack-network join tables, so `down` knows which
    // resources a stack declared without re-reading the manifest
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stack_volumes (
            stack_name TEXT NOT NULL,
            volume_name TEXT NOT NULL,
            PRIMARY KEY (stack_name, volume_name)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stack_networks (
            stack_name TEXT NOT NULL,
            network_name TEXT NOT NULL,
            PRIMARY KEY (stack_name, network_name)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    set_version(pool, 1).await?;

    info!("Migration to schema version 1 complete");
    Ok(())
}

/// Migration to schema version 2: add persistence flag to volumes.
#[instrument(skip(pool))]
async fn migrate_to_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 2");

    sqlx::query(
        r#"
        ALTER TABLE volumes ADD COLUMN persistent INTEGER NOT NULL DEFAULT 1
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| SkiffError::MigrationFailed { reason: e.to_string() })?;

    set_version(pool, 2).await?;

    info!("Migration to schema version 2 complete");
    Ok(())
}
