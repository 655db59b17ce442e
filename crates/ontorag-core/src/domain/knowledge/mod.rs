//! Knowledge graph domain module
//!
//! Entities (rules, characteristics, concepts) and the edges between them,
//! plus the retrieval path that turns a question into context text:
//!
//! ```text
//! query ─┬─ extract_ids ──── EntityStore::find_entity_by_label ─┐
//!        └─ VectorIndex::query ─────────────────────────────────┤
//!                                                               ▼
//!                                     ContextExpander (entity + neighbors)
//!                                                               ▼
//!                                             context text / sentinel
//! ```
//!
//! ```rust,ignore
//! use ontorag_core::domain::knowledge::KnowledgeRetriever;
//!
//! let retriever = KnowledgeRetriever::new(store, index);
//! let context = retriever.search("Как формулировать требования к единицам измерения?").await;
//! ```

mod catalog;
mod context;
mod entity;
mod relationship;
mod repository;
mod retriever;

pub use catalog::OntologyCatalog;
pub use context::{
    ContextExpander, ContextLabels, ContextLanguage, DEFAULT_NEIGHBOR_LIMIT, render_block,
};
pub use entity::{EntityType, KnowledgeEntity, uri_fragment};
pub use relationship::{KnowledgeRelationship, RelationshipType, rendered_name};
pub use repository::{EntityStore, KnowledgeGraphStats, Neighbor, TraversalDirection};
pub use retriever::{
    DEFAULT_TOP_K, KnowledgeRetriever, RetrieverConfig, SearchOutcome, extract_ids,
};
