//! Knowledge relationships
//!
//! Directed, typed edges between entities. An edge may carry a display
//! name taken from the ontology; when it doesn't, the type tag is shown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed edge between two knowledge entities
///
/// At most one edge exists per (source, target, type). Saving the same
/// triple again only refreshes the display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRelationship {
    /// URI of the source entity
    pub source_uri: String,
    /// URI of the target entity
    pub target_uri: String,
    /// Type of relationship
    pub relationship_type: RelationshipType,
    /// Human-readable name from the source ontology, if any
    pub display_name: Option<String>,
    /// When the relationship was created
    pub created_at: DateTime<Utc>,
}

impl KnowledgeRelationship {
    /// Create a new relationship between two entities
    pub fn new(
        source_uri: impl Into<String>,
        target_uri: impl Into<String>,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            source_uri: source_uri.into(),
            target_uri: target_uri.into(),
            relationship_type,
            display_name: None,
            created_at: Utc::now(),
        }
    }

    /// Shorthand for a SUPPORTS edge
    pub fn supports(source_uri: impl Into<String>, target_uri: impl Into<String>) -> Self {
        Self::new(source_uri, target_uri, RelationshipType::Supports)
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name used when rendering the edge
    pub fn rendered_name(&self) -> &str {
        rendered_name(self.display_name.as_deref(), self.relationship_type)
    }
}

/// Display name when present and non-empty, else the type tag
pub fn rendered_name(display_name: Option<&str>, relationship_type: RelationshipType) -> &str {
    match display_name {
        Some(name) if !name.trim().is_empty() => name,
        _ => relationship_type.as_str(),
    }
}

/// Types of relationships between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    /// Source (a rule) supports target (a characteristic)
    Supports,
}

impl RelationshipType {
    /// Wire tag stored in the graph
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supports => "SUPPORTS",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SUPPORTS" | "SUPPORTS_CHARACTERISTIC" => Some(Self::Supports),
            _ => None,
        }
    }

    /// Get all relationship types
    pub fn all() -> &'static [RelationshipType] {
        &[Self::Supports]
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_creation() {
        let rel = KnowledgeRelationship::supports("urn:R1", "urn:C1");
        assert_eq!(rel.source_uri, "urn:R1");
        assert_eq!(rel.target_uri, "urn:C1");
        assert_eq!(rel.relationship_type, RelationshipType::Supports);
        assert!(rel.display_name.is_none());
    }

    #[test]
    fn test_rendered_name() {
        let rel = KnowledgeRelationship::supports("a", "b");
        assert_eq!(rel.rendered_name(), "SUPPORTS");

        let rel = rel.with_display_name("поддерживает характеристику");
        assert_eq!(rel.rendered_name(), "поддерживает характеристику");

        assert_eq!(rendered_name(Some("  "), RelationshipType::Supports), "SUPPORTS");
    }

    #[test]
    fn test_relationship_type_parsing() {
        assert_eq!(RelationshipType::parse("supports"), Some(RelationshipType::Supports));
        assert_eq!(RelationshipType::parse("uses"), None);
        assert_eq!(
            serde_json::to_string(&RelationshipType::Supports).unwrap(),
            "\"SUPPORTS\""
        );
    }
}
