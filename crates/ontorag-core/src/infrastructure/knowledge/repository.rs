//! SQLite implementation of the EntityStore
//!
//! Entities are keyed by URI; edges are unique per (source, target, type)
//! and only inserted when both endpoints exist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::domain::knowledge::{
    EntityStore, EntityType, KnowledgeEntity, KnowledgeGraphStats, KnowledgeRelationship,
    Neighbor, RelationshipType, TraversalDirection,
};
use crate::error::{Error, Result};

/// SQLite implementation of the entity store
#[derive(Clone)]
pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    /// Create a new SQLite entity store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    // ========== Entity Operations ==========

    async fn save_entity(&self, entity: &KnowledgeEntity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entities (
                uri, label, definition, rationale, guidance, example,
                entity_type, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(uri) DO UPDATE SET
                label = excluded.label,
                definition = excluded.definition,
                rationale = excluded.rationale,
                guidance = excluded.guidance,
                example = excluded.example,
                entity_type = excluded.entity_type,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entity.uri)
        .bind(&entity.label)
        .bind(&entity.definition)
        .bind(&entity.rationale)
        .bind(&entity.guidance)
        .bind(&entity.example)
        .bind(entity.entity_type.as_str())
        .bind(entity.created_at.to_rfc3339())
        .bind(entity.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(uri = %entity.uri, label = %entity.label, "Entity saved");
        Ok(())
    }

    async fn get_entity(&self, uri: &str) -> Result<Option<KnowledgeEntity>> {
        let row: Option<EntityRow> = sqlx::query_as("SELECT * FROM entities WHERE uri = ?")
            .bind(uri)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_entity()).transpose()
    }

    async fn find_entity_by_label(&self, label: &str) -> Result<Option<KnowledgeEntity>> {
        let row: Option<EntityRow> = sqlx::query_as(
            "SELECT * FROM entities WHERE label = ? COLLATE NOCASE ORDER BY rowid LIMIT 1",
        )
        .bind(label.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_entity()).transpose()
    }

    async fn list_entities(&self) -> Result<Vec<KnowledgeEntity>> {
        let rows: Vec<EntityRow> = sqlx::query_as("SELECT * FROM entities ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.into_entity()).collect()
    }

    async fn list_entities_by_type(&self, entity_type: EntityType) -> Result<Vec<KnowledgeEntity>> {
        let rows: Vec<EntityRow> =
            sqlx::query_as("SELECT * FROM entities WHERE entity_type = ? ORDER BY rowid")
                .bind(entity_type.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(|r| r.into_entity()).collect()
    }

    async fn count_entities(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    // ========== Relationship Operations ==========

    async fn save_relationship(&self, relationship: &KnowledgeRelationship) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO relationships (
                source_uri, target_uri, relationship_type, display_name, created_at
            )
            SELECT ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM entities WHERE uri = ?)
              AND EXISTS (SELECT 1 FROM entities WHERE uri = ?)
            ON CONFLICT(source_uri, target_uri, relationship_type) DO UPDATE SET
                display_name = excluded.display_name
            "#,
        )
        .bind(&relationship.source_uri)
        .bind(&relationship.target_uri)
        .bind(relationship.relationship_type.as_str())
        .bind(&relationship.display_name)
        .bind(relationship.created_at.to_rfc3339())
        .bind(&relationship.source_uri)
        .bind(&relationship.target_uri)
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() > 0;
        if created {
            debug!(
                source = %relationship.source_uri,
                target = %relationship.target_uri,
                relationship_type = %relationship.relationship_type,
                "Relationship saved"
            );
        } else {
            debug!(
                source = %relationship.source_uri,
                target = %relationship.target_uri,
                "Relationship skipped, endpoint missing"
            );
        }
        Ok(created)
    }

    async fn get_neighbors(&self, uri: &str, limit: usize) -> Result<Vec<Neighbor>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<NeighborRow> = sqlx::query_as(
            r#"
            SELECT seq, uri, label, relationship_type, display_name, direction FROM (
                SELECT r.rowid AS seq, e.uri AS uri, e.label AS label,
                       r.relationship_type AS relationship_type,
                       r.display_name AS display_name, 'outgoing' AS direction
                FROM relationships r
                JOIN entities e ON e.uri = r.target_uri
                WHERE r.source_uri = ?
                UNION ALL
                SELECT r.rowid AS seq, e.uri AS uri, e.label AS label,
                       r.relationship_type AS relationship_type,
                       r.display_name AS display_name, 'incoming' AS direction
                FROM relationships r
                JOIN entities e ON e.uri = r.source_uri
                WHERE r.target_uri = ?
            )
            ORDER BY seq, direction DESC
            LIMIT ?
            "#,
        )
        .bind(uri)
        .bind(uri)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_neighbor()).collect()
    }

    async fn count_relationships(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM relationships")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    // ========== Maintenance ==========

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let relationships = sqlx::query("DELETE FROM relationships")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let entities = sqlx::query("DELETE FROM entities")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        info!(entities, relationships, "Entity store cleared");
        Ok(())
    }

    async fn get_stats(&self) -> Result<KnowledgeGraphStats> {
        let total_entities = self.count_entities().await?;
        let total_relationships = self.count_relationships().await?;

        let entities_by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT entity_type, COUNT(*) FROM entities GROUP BY entity_type ORDER BY entity_type",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(KnowledgeGraphStats {
            total_entities,
            total_relationships,
            entities_by_type: entities_by_type
                .into_iter()
                .filter_map(|(t, c)| EntityType::parse(&t).map(|et| (et, c as u64)))
                .collect(),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ========== Database Row Types ==========

#[derive(Debug, FromRow)]
struct EntityRow {
    uri: String,
    label: String,
    definition: Option<String>,
    rationale: Option<String>,
    guidance: Option<String>,
    example: Option<String>,
    entity_type: String,
    created_at: String,
    updated_at: String,
}

impl EntityRow {
    fn into_entity(self) -> Result<KnowledgeEntity> {
        let entity_type = EntityType::parse(&self.entity_type)
            .ok_or_else(|| Error::Other(format!("Invalid entity type: {}", self.entity_type)))?;

        Ok(KnowledgeEntity {
            uri: self.uri,
            entity_type,
            label: self.label,
            definition: self.definition,
            rationale: self.rationale,
            guidance: self.guidance,
            example: self.example,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct NeighborRow {
    #[allow(dead_code)]
    seq: i64,
    uri: String,
    label: String,
    relationship_type: String,
    display_name: Option<String>,
    direction: String,
}

impl NeighborRow {
    fn into_neighbor(self) -> Result<Neighbor> {
        let relationship_type = RelationshipType::parse(&self.relationship_type).ok_or_else(|| {
            Error::Other(format!("Invalid relationship type: {}", self.relationship_type))
        })?;

        let direction = if self.direction == "incoming" {
            TraversalDirection::Incoming
        } else {
            TraversalDirection::Outgoing
        };

        Ok(Neighbor {
            uri: self.uri,
            label: self.label,
            relationship_type,
            display_name: self.display_name,
            direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqliteEntityStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");

        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        SqliteEntityStore::new(pool)
    }

    fn uri(local: &str) -> String {
        format!("http://incose.org/guide/ru#{}", local)
    }

    #[tokio::test]
    async fn test_save_and_get_entity_roundtrip() {
        let store = setup_test_db().await;

        let entity = KnowledgeEntity::new(uri("R3"), "R3")
            .with_definition("Определение")
            .with_rationale("Обоснование")
            .with_guidance("Указания")
            .with_example("Пример");

        store.save_entity(&entity).await.unwrap();

        let retrieved = store.get_entity(&entity.uri).await.unwrap().unwrap();
        assert_eq!(retrieved.uri, entity.uri);
        assert_eq!(retrieved.label, "R3");
        assert_eq!(retrieved.entity_type, EntityType::Rule);
        assert_eq!(retrieved.definition.as_deref(), Some("Определение"));
        assert_eq!(retrieved.rationale.as_deref(), Some("Обоснование"));
        assert_eq!(retrieved.guidance.as_deref(), Some("Указания"));
        assert_eq!(retrieved.example.as_deref(), Some("Пример"));
    }

    #[tokio::test]
    async fn test_missing_attributes_stay_none() {
        let store = setup_test_db().await;

        let entity = KnowledgeEntity::new(uri("C1"), "C1");
        store.save_entity(&entity).await.unwrap();

        let retrieved = store.get_entity(&entity.uri).await.unwrap().unwrap();
        assert!(retrieved.definition.is_none());
        assert!(retrieved.example.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_entity() {
        let store = setup_test_db().await;
        assert!(store.get_entity(&uri("R404")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_entity_on_conflict() {
        let store = setup_test_db().await;

        let mut entity = KnowledgeEntity::new(uri("R1"), "R1").with_definition("Original");
        store.save_entity(&entity).await.unwrap();

        entity.definition = Some("Updated".to_string());
        entity.example = Some("New example".to_string());
        store.save_entity(&entity).await.unwrap();

        let retrieved = store.get_entity(&entity.uri).await.unwrap().unwrap();
        assert_eq!(retrieved.definition.as_deref(), Some("Updated"));
        assert_eq!(retrieved.example.as_deref(), Some("New example"));
        assert_eq!(store.count_entities().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_entity_by_label_ignores_case() {
        let store = setup_test_db().await;
        store
            .save_entity(&KnowledgeEntity::new(uri("R7"), "R7"))
            .await
            .unwrap();

        let found = store.find_entity_by_label("r7").await.unwrap();
        assert_eq!(found.map(|e| e.uri), Some(uri("R7")));
        assert!(store.find_entity_by_label("R8").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_relationship_requires_both_endpoints() {
        let store = setup_test_db().await;
        store
            .save_entity(&KnowledgeEntity::new(uri("R1"), "R1"))
            .await
            .unwrap();

        let rel = KnowledgeRelationship::supports(uri("R1"), uri("C99"));
        let created = store.save_relationship(&rel).await.unwrap();

        assert!(!created);
        assert_eq!(store.count_relationships().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_relationship_on_conflict() {
        let store = setup_test_db().await;
        store
            .save_entity(&KnowledgeEntity::new(uri("R1"), "R1"))
            .await
            .unwrap();
        store
            .save_entity(&KnowledgeEntity::new(uri("C1"), "C1"))
            .await
            .unwrap();

        let rel = KnowledgeRelationship::supports(uri("R1"), uri("C1"));
        assert!(store.save_relationship(&rel).await.unwrap());

        let rel = rel.with_display_name("поддерживает");
        assert!(store.save_relationship(&rel).await.unwrap());

        assert_eq!(store.count_relationships().await.unwrap(), 1);
        let neighbors = store.get_neighbors(&uri("R1"), 10).await.unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].relationship_name(), "поддерживает");
    }

    #[tokio::test]
    async fn test_get_neighbors_both_directions() {
        let store = setup_test_db().await;
        for label in ["R1", "R2", "C1"] {
            store
                .save_entity(&KnowledgeEntity::new(uri(label), label))
                .await
                .unwrap();
        }
        store
            .save_relationship(&KnowledgeRelationship::supports(uri("R1"), uri("C1")))
            .await
            .unwrap();
        store
            .save_relationship(&KnowledgeRelationship::supports(uri("R2"), uri("C1")))
            .await
            .unwrap();

        let from_rule = store.get_neighbors(&uri("R1"), 10).await.unwrap();
        assert_eq!(from_rule.len(), 1);
        assert_eq!(from_rule[0].label, "C1");
        assert_eq!(from_rule[0].direction, TraversalDirection::Outgoing);

        let from_characteristic = store.get_neighbors(&uri("C1"), 10).await.unwrap();
        let labels: Vec<_> = from_characteristic.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["R1", "R2"]);
        assert!(
            from_characteristic
                .iter()
                .all(|n| n.direction == TraversalDirection::Incoming)
        );
    }

    #[tokio::test]
    async fn test_get_neighbors_respects_limit() {
        let store = setup_test_db().await;
        store
            .save_entity(&KnowledgeEntity::new(uri("C1"), "C1"))
            .await
            .unwrap();
        for i in 1..=15 {
            let label = format!("R{}", i);
            store
                .save_entity(&KnowledgeEntity::new(uri(&label), &label))
                .await
                .unwrap();
            store
                .save_relationship(&KnowledgeRelationship::supports(uri(&label), uri("C1")))
                .await
                .unwrap();
        }

        let neighbors = store.get_neighbors(&uri("C1"), 10).await.unwrap();
        assert_eq!(neighbors.len(), 10);
        assert_eq!(neighbors[0].label, "R1");
        assert_eq!(neighbors[9].label, "R10");

        assert!(store.get_neighbors(&uri("C1"), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_entities_by_type() {
        let store = setup_test_db().await;
        for label in ["R2", "C1", "R1", "Требование"] {
            store
                .save_entity(&KnowledgeEntity::new(uri(label), label))
                .await
                .unwrap();
        }

        let rules = store.list_entities_by_type(EntityType::Rule).await.unwrap();
        let labels: Vec<_> = rules.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["R2", "R1"]);

        let concepts = store.list_entities_by_type(EntityType::Concept).await.unwrap();
        assert_eq!(concepts.len(), 1);
        assert_eq!(store.list_entities().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = setup_test_db().await;
        store
            .save_entity(&KnowledgeEntity::new(uri("R1"), "R1"))
            .await
            .unwrap();
        store
            .save_entity(&KnowledgeEntity::new(uri("C1"), "C1"))
            .await
            .unwrap();
        store
            .save_relationship(&KnowledgeRelationship::supports(uri("R1"), uri("C1")))
            .await
            .unwrap();

        store.clear().await.unwrap();

        assert_eq!(store.count_entities().await.unwrap(), 0);
        assert_eq!(store.count_relationships().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = setup_test_db().await;
        for label in ["R1", "R2", "C1"] {
            store
                .save_entity(&KnowledgeEntity::new(uri(label), label))
                .await
                .unwrap();
        }
        store
            .save_relationship(&KnowledgeRelationship::supports(uri("R1"), uri("C1")))
            .await
            .unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.total_relationships, 1);
        assert!(stats.entities_by_type.contains(&(EntityType::Rule, 2)));
        assert!(stats.entities_by_type.contains(&(EntityType::Characteristic, 1)));
    }
}
