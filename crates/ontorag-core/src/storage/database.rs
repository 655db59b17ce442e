//! SQLite connection pool for the knowledge base
//!
//! A knowledge base lives either in a file (created on first open, parent
//! directories included) or in memory for tests. Opening runs pending
//! migrations unless told otherwise.

use crate::storage::migrations;
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Ingestion holds a write transaction while clearing; readers wait this long
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the knowledge base is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    File(PathBuf),
    /// Private to a single connection
    Memory,
}

impl StorageLocation {
    fn display_path(&self) -> &Path {
        match self {
            Self::File(path) => path,
            Self::Memory => Path::new(":memory:"),
        }
    }
}

/// How to open a [`Database`]
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub location: StorageLocation,
    pub max_connections: u32,
    pub auto_migrate: bool,
}

impl DatabaseConfig {
    /// File-backed database at `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StorageLocation::File(path.into()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auto_migrate: true,
        }
    }

    /// In-memory database; limited to one connection so every query sees
    /// the same data
    pub fn in_memory() -> Self {
        Self {
            location: StorageLocation::Memory,
            max_connections: 1,
            auto_migrate: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn no_migrate(mut self) -> Self {
        self.auto_migrate = false;
        self
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = match &self.location {
            StorageLocation::Memory => SqliteConnectOptions::new().in_memory(true),
            StorageLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory: {}", parent.display())
                    })?;
                }
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
            }
        };

        Ok(options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT))
    }
}

/// Handle to the knowledge base pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    location: StorageLocation,
}

impl Database {
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options()?)
            .await
            .with_context(|| {
                format!(
                    "Failed to open knowledge base at {}",
                    config.location.display_path().display()
                )
            })?;

        let db = Self {
            pool,
            location: config.location,
        };

        if config.auto_migrate {
            db.migrate().await?;
        }

        tracing::debug!(path = %db.path().display(), "Database opened");
        Ok(db)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new(DatabaseConfig::in_memory()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn is_memory(&self) -> bool {
        self.location == StorageLocation::Memory
    }

    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool)
            .await
            .context("Failed to migrate knowledge base schema")
    }

    pub async fn migration_status(&self) -> Result<migrations::MigrationStatus> {
        migrations::migration_status(&self.pool)
            .await
            .context("Failed to read knowledge base schema version")
    }

    pub async fn health_check(&self) -> Result<()> {
        let (one,): (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;
        anyhow::ensure!(one == 1, "Database health check returned {}", one);
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Database file, or `:memory:`
    pub fn path(&self) -> &Path {
        self.location.display_path()
    }
}
