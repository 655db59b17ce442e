//! Storage layer - SQLite
//!
//! - `database`: pool for a file-backed or in-memory knowledge base
//! - `migrations`: versioned schema, applied on open
//!
//! ```ignore
//! use ontorag_core::storage::Database;
//!
//! let db = Database::in_memory().await?;
//! ```

pub mod database;
pub mod migrations;

pub use database::{Database, DatabaseConfig, StorageLocation};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
