//! Database migrations
//!
//! Versioned SQLite schema for the knowledge graph and the vector index.
//! Migrations are applied automatically when a database is opened.

use anyhow::Context;
use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Knowledge graph
const MIGRATION_V1: &str = r#"
    -- Ontology individuals (rules, characteristics, concepts)
    CREATE TABLE IF NOT EXISTS entities (
        uri TEXT PRIMARY KEY NOT NULL,
        label TEXT NOT NULL,
        definition TEXT,
        rationale TEXT,
        guidance TEXT,
        example TEXT,
        entity_type TEXT NOT NULL DEFAULT 'concept' CHECK (entity_type IN ('rule', 'characteristic', 'concept')),
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type);
    CREATE INDEX IF NOT EXISTS idx_entities_label ON entities(label COLLATE NOCASE);

    -- Directed, typed edges between entities
    CREATE TABLE IF NOT EXISTS relationships (
        source_uri TEXT NOT NULL REFERENCES entities(uri) ON DELETE CASCADE,
        target_uri TEXT NOT NULL REFERENCES entities(uri) ON DELETE CASCADE,
        relationship_type TEXT NOT NULL,
        display_name TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(source_uri, target_uri, relationship_type)
    );

    CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_uri);
    CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_uri);
"#;

/// Migration 2: Vector index
const MIGRATION_V2: &str = r#"
    CREATE TABLE IF NOT EXISTS vector_collections (
        name TEXT PRIMARY KEY NOT NULL,
        embedding_model TEXT NOT NULL,
        dimensions INTEGER NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS vector_records (
        collection TEXT NOT NULL REFERENCES vector_collections(name) ON DELETE CASCADE,
        id TEXT NOT NULL,
        document TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}',
        embedding BLOB NOT NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (collection, id)
    );
"#;

struct Migration {
    version: i32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "knowledge graph",
        sql: MIGRATION_V1,
    },
    Migration {
        version: 2,
        name: "vector index",
        sql: MIGRATION_V2,
    },
];

/// Highest applied version, 0 for a fresh database
async fn applied_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let (version,): (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply every migration newer than the recorded version, each in its own
/// transaction
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let applied = applied_version(pool).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();

    if pending.is_empty() {
        tracing::debug!(version = applied, "Knowledge base schema is up to date");
        return Ok(());
    }

    for migration in pending {
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applying schema migration"
        );

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Migration v{} ({}) failed", migration.version, migration.name))?;
        sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    Ok(())
}

pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = applied_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Schema version of a database relative to this build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current_version: i32,
    pub target_version: i32,
    pub needs_migration: bool,
}
