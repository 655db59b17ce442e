//! Ontorag Core Library
//!
//! Ontology-backed retrieval for a requirements-engineering assistant:
//! - Knowledge graph of INCOSE rules and characteristics (SQLite)
//! - Vector index over entity descriptions
//! - Context assembly: identifier lookup, similarity search, graph expansion
//! - Turtle ingestion pipeline
//! - Question routing between the architect and expert agents

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ingest;
pub mod knowledge_base;
pub mod routing;
pub mod storage;

pub use error::{Error, Result};
pub use knowledge_base::{KnowledgeBase, KnowledgeBaseStats};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::knowledge::{
        EntityStore, EntityType, KnowledgeEntity, KnowledgeRelationship, KnowledgeRetriever,
    };
    pub use crate::domain::vector::{VectorCandidate, VectorIndex, VectorLookup};
    pub use crate::error::{Error, Result};
    pub use crate::ingest::IngestReport;
    pub use crate::knowledge_base::KnowledgeBase;
    pub use crate::routing::{AgentRole, QuestionRouter};
}
