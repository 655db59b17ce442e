//! Repository trait for knowledge graph persistence
//!
//! The trait abstracts over the graph backend so the retriever and the
//! ingestion pipeline can be exercised against any store.

use async_trait::async_trait;

use crate::error::Result;

use super::entity::{EntityType, KnowledgeEntity};
use super::relationship::{KnowledgeRelationship, RelationshipType, rendered_name};

/// Graph store capabilities used by retrieval and ingestion
#[async_trait]
pub trait EntityStore: Send + Sync {
    // ========== Entity Operations ==========

    /// Save a knowledge entity (insert or replace attributes by URI)
    async fn save_entity(&self, entity: &KnowledgeEntity) -> Result<()>;

    /// Get an entity by URI
    async fn get_entity(&self, uri: &str) -> Result<Option<KnowledgeEntity>>;

    /// Get an entity by label, ignoring case
    async fn find_entity_by_label(&self, label: &str) -> Result<Option<KnowledgeEntity>>;

    /// List all entities in insertion order
    async fn list_entities(&self) -> Result<Vec<KnowledgeEntity>>;

    /// List entities by type
    async fn list_entities_by_type(&self, entity_type: EntityType) -> Result<Vec<KnowledgeEntity>>;

    /// Count entities
    async fn count_entities(&self) -> Result<u64>;

    // ========== Relationship Operations ==========

    /// Save a relationship, merging on (source, target, type).
    ///
    /// Returns `false` without error when either endpoint does not exist.
    async fn save_relationship(&self, relationship: &KnowledgeRelationship) -> Result<bool>;

    /// Entities directly connected to `uri` in either direction, in edge
    /// creation order, at most `limit` of them
    async fn get_neighbors(&self, uri: &str, limit: usize) -> Result<Vec<Neighbor>>;

    /// Count relationships
    async fn count_relationships(&self) -> Result<u64>;

    // ========== Maintenance ==========

    /// Delete every relationship and entity
    async fn clear(&self) -> Result<()>;

    /// Get graph statistics
    async fn get_stats(&self) -> Result<KnowledgeGraphStats>;
}

/// Which side of the edge the starting entity was on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    /// Starting entity is the source
    Outgoing,
    /// Starting entity is the target
    Incoming,
}

/// An entity adjacent to the starting entity, with the connecting edge
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// URI of the entity on the other end
    pub uri: String,
    /// Label of the entity on the other end
    pub label: String,
    pub relationship_type: RelationshipType,
    pub display_name: Option<String>,
    pub direction: TraversalDirection,
}

impl Neighbor {
    /// Edge name shown in context blocks
    pub fn relationship_name(&self) -> &str {
        rendered_name(self.display_name.as_deref(), self.relationship_type)
    }
}

/// Statistics about the knowledge graph
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraphStats {
    /// Total number of entities
    pub total_entities: u64,
    /// Total number of relationships
    pub total_relationships: u64,
    /// Entities by type
    pub entities_by_type: Vec<(EntityType, u64)>,
}
