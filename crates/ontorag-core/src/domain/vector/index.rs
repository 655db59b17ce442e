//! Vector index abstraction
//!
//! A named collection of documents with embeddings. Each record is keyed by
//! the URI of the entity it was built from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Similarity index over embedded documents
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the collection this index reads and writes
    fn collection(&self) -> &str;

    /// Create the collection if it does not exist
    async fn ensure_collection(&self) -> Result<()>;

    /// Drop the collection and every record in it
    async fn delete_collection(&self) -> Result<()>;

    /// Embed `record.document` and store it, replacing any record with the same id
    async fn upsert(&self, record: &EmbeddingRecord) -> Result<()>;

    /// The `top_n` records most similar to `text`, best first
    async fn query(&self, text: &str, top_n: usize) -> Result<Vec<VectorCandidate>>;

    /// Number of records in the collection
    async fn count(&self) -> Result<u64>;
}

/// Metadata stored next to each embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub uri: String,
    pub label: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

/// A document queued for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    /// Record id, the entity URI
    pub id: String,
    /// Text that gets embedded
    pub document: String,
    pub metadata: EmbeddingMetadata,
}

/// A scored hit from the vector index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorCandidate {
    pub uri: String,
    pub label: String,
    pub similarity: f32,
}

impl VectorCandidate {
    pub fn new(uri: impl Into<String>, label: impl Into<String>, similarity: f32) -> Self {
        Self {
            uri: uri.into(),
            label: label.into(),
            similarity,
        }
    }
}

/// Outcome of a vector lookup.
///
/// `Unavailable` keeps the reason a lookup failed instead of folding it
/// into an empty hit list.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorLookup {
    Hits(Vec<VectorCandidate>),
    Unavailable(String),
}

impl VectorLookup {
    /// Candidates, or nothing when the index was unavailable
    pub fn into_candidates(self) -> Vec<VectorCandidate> {
        match self {
            Self::Hits(candidates) => candidates,
            Self::Unavailable(_) => Vec::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Hits(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_into_candidates() {
        let hits = VectorLookup::Hits(vec![VectorCandidate::new("urn:R1", "R1", 0.9)]);
        assert!(hits.is_available());
        assert_eq!(hits.into_candidates().len(), 1);

        let unavailable = VectorLookup::Unavailable("collection missing".into());
        assert!(!unavailable.is_available());
        assert!(unavailable.into_candidates().is_empty());
    }

    #[test]
    fn test_metadata_serializes_type_key() {
        let metadata = EmbeddingMetadata {
            uri: "urn:R1".into(),
            label: "R1".into(),
            entity_type: "rule".into(),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["type"], "rule");
    }
}
