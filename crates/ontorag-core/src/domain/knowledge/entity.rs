//! Knowledge entity types
//!
//! Entities are the ontology individuals ingested into the graph: writing
//! rules, requirement characteristics, and the remaining domain concepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node of the knowledge graph, identified by its URI.
///
/// Saving an entity whose URI already exists replaces its attributes.
/// Missing attributes are `None`; an empty string is treated the same way
/// when the entity is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntity {
    /// Stable identity (the ontology IRI)
    pub uri: String,
    /// Kind of entity, inferred from the label shape
    pub entity_type: EntityType,
    /// Human-readable label, e.g. "R3" or "Необходимость"
    pub label: String,
    pub definition: Option<String>,
    pub rationale: Option<String>,
    pub guidance: Option<String>,
    pub example: Option<String>,
    /// When the entity was created
    pub created_at: DateTime<Utc>,
    /// When the entity was last updated
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntity {
    /// Create a new entity, inferring its type from the label
    pub fn new(uri: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        let now = Utc::now();

        Self {
            uri: uri.into(),
            entity_type: EntityType::infer(&label),
            label,
            definition: None,
            rationale: None,
            guidance: None,
            example: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an entity labelled with the trailing fragment of its URI
    pub fn from_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let label = uri_fragment(&uri).to_string();
        Self::new(uri, label)
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Override the inferred type
    pub fn with_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = entity_type;
        self
    }

    /// Numeric part of an identifier label ("R12" -> 12)
    pub fn identifier_number(&self) -> Option<u32> {
        let digits: String = self
            .label
            .chars()
            .skip(1)
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

/// Text after the last `#`, else after the last `/`, else the whole URI
pub fn uri_fragment(uri: &str) -> &str {
    if let Some((_, fragment)) = uri.rsplit_once('#') {
        fragment
    } else if let Some((_, tail)) = uri.rsplit_once('/') {
        tail
    } else {
        uri
    }
}

/// Types of knowledge entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Writing rule, labelled "R<n>"
    Rule,
    /// Requirement characteristic, labelled "C<n>"
    Characteristic,
    /// Any other ontology individual
    Concept,
}

impl EntityType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Characteristic => "characteristic",
            Self::Concept => "concept",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "rule" | "rules" => Some(Self::Rule),
            "characteristic" | "char" => Some(Self::Characteristic),
            "concept" => Some(Self::Concept),
            _ => None,
        }
    }

    /// Infer the type from a label: "R<digits>" is a rule, "C<digits>" a
    /// characteristic, anything else a concept
    pub fn infer(label: &str) -> Self {
        let mut chars = label.trim_start().chars();
        let prefix = chars.next();
        let followed_by_digit = chars.next().is_some_and(|c| c.is_ascii_digit());

        match (prefix, followed_by_digit) {
            (Some('R'), true) => Self::Rule,
            (Some('C'), true) => Self::Characteristic,
            _ => Self::Concept,
        }
    }

    /// Get all entity types
    pub fn all() -> &'static [EntityType] {
        &[Self::Rule, Self::Characteristic, Self::Concept]
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_creation() {
        let entity = KnowledgeEntity::new("http://incose.org/guide/ru#R1", "R1")
            .with_definition("Структура")
            .with_example("Система должна...");

        assert_eq!(entity.label, "R1");
        assert_eq!(entity.entity_type, EntityType::Rule);
        assert_eq!(entity.definition.as_deref(), Some("Структура"));
        assert!(entity.rationale.is_none());
        assert_eq!(entity.example.as_deref(), Some("Система должна..."));
    }

    #[test]
    fn test_from_uri_uses_fragment() {
        let entity = KnowledgeEntity::from_uri("http://incose.org/guide/ru#C4");
        assert_eq!(entity.label, "C4");
        assert_eq!(entity.entity_type, EntityType::Characteristic);

        let entity = KnowledgeEntity::from_uri("http://example.org/terms/Verification");
        assert_eq!(entity.label, "Verification");
        assert_eq!(entity.entity_type, EntityType::Concept);
    }

    #[test]
    fn test_uri_fragment() {
        assert_eq!(uri_fragment("http://a.org/x#R9"), "R9");
        assert_eq!(uri_fragment("http://a.org/x/y"), "y");
        assert_eq!(uri_fragment("urn-plain"), "urn-plain");
    }

    #[test]
    fn test_type_inference() {
        assert_eq!(EntityType::infer("R1"), EntityType::Rule);
        assert_eq!(EntityType::infer("R42"), EntityType::Rule);
        assert_eq!(EntityType::infer("C9"), EntityType::Characteristic);
        assert_eq!(EntityType::infer("Requirement"), EntityType::Concept);
        assert_eq!(EntityType::infer("C"), EntityType::Concept);
        assert_eq!(EntityType::infer("r1"), EntityType::Concept);
        assert_eq!(EntityType::infer(""), EntityType::Concept);
    }

    #[test]
    fn test_identifier_number() {
        assert_eq!(KnowledgeEntity::new("u", "R12").identifier_number(), Some(12));
        assert_eq!(KnowledgeEntity::new("u", "Concept").identifier_number(), None);
    }

    #[test]
    fn test_entity_type_parsing() {
        assert_eq!(EntityType::parse("RULE"), Some(EntityType::Rule));
        assert_eq!(EntityType::parse("char"), Some(EntityType::Characteristic));
        assert_eq!(EntityType::parse("unknown"), None);
        assert_eq!(EntityType::all().len(), 3);
    }
}
