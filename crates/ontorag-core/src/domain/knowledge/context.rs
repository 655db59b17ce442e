//! Graph context expansion
//!
//! Turns a list of candidate entities into the text block handed to the
//! expert agent: each entity's attributes followed by its direct relations.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::vector::VectorCandidate;

use super::entity::KnowledgeEntity;
use super::repository::{EntityStore, Neighbor};

/// Default number of relations listed per entity
pub const DEFAULT_NEIGHBOR_LIMIT: usize = 10;

/// Language of the headers in rendered context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextLanguage {
    #[default]
    #[serde(rename = "ru")]
    Russian,
    #[serde(rename = "en")]
    English,
}

impl ContextLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Russian => "ru",
            Self::English => "en",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ru" | "russian" => Some(Self::Russian),
            "en" | "english" => Some(Self::English),
            _ => None,
        }
    }
}

/// Words used in rendered context blocks and embedding documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLabels {
    pub term: &'static str,
    pub definition: &'static str,
    pub rationale: &'static str,
    pub guidance: &'static str,
    pub example: &'static str,
    pub relations: &'static str,
    /// Returned by search when nothing relevant was found
    pub not_found: &'static str,
}

impl ContextLabels {
    pub const RUSSIAN: ContextLabels = ContextLabels {
        term: "ТЕРМИН",
        definition: "Определение",
        rationale: "Обоснование",
        guidance: "Указания",
        example: "Пример",
        relations: "Связи",
        not_found: "В Базе Знаний нет прямой информации по этому запросу.",
    };

    pub const ENGLISH: ContextLabels = ContextLabels {
        term: "TERM",
        definition: "Definition",
        rationale: "Rationale",
        guidance: "Guidance",
        example: "Example",
        relations: "Relations",
        not_found: "No information found in the knowledge base for this query.",
    };

    pub fn for_language(language: ContextLanguage) -> Self {
        match language {
            ContextLanguage::Russian => Self::RUSSIAN,
            ContextLanguage::English => Self::ENGLISH,
        }
    }
}

impl Default for ContextLabels {
    fn default() -> Self {
        Self::RUSSIAN
    }
}

/// Expands candidates into context blocks using the entity store
pub struct ContextExpander<S: EntityStore + ?Sized> {
    store: Arc<S>,
    labels: ContextLabels,
    neighbor_limit: usize,
}

impl<S: EntityStore + ?Sized> ContextExpander<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            labels: ContextLabels::default(),
            neighbor_limit: DEFAULT_NEIGHBOR_LIMIT,
        }
    }

    pub fn with_labels(mut self, labels: ContextLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_neighbor_limit(mut self, limit: usize) -> Self {
        self.neighbor_limit = limit;
        self
    }

    pub fn labels(&self) -> &ContextLabels {
        &self.labels
    }

    /// Render one block per distinct candidate, in first-seen order.
    ///
    /// Candidates whose entity is missing or cannot be read are skipped.
    /// Returns an empty string when no block was produced.
    pub async fn expand(&self, candidates: &[VectorCandidate]) -> String {
        let mut seen = HashSet::new();
        let mut blocks = Vec::new();

        for candidate in candidates {
            if !seen.insert(candidate.uri.as_str()) {
                continue;
            }

            let entity = match self.store.get_entity(&candidate.uri).await {
                Ok(Some(entity)) => entity,
                Ok(None) => {
                    debug!(uri = %candidate.uri, "Candidate has no entity in the graph");
                    continue;
                }
                Err(e) => {
                    warn!(uri = %candidate.uri, error = %e, "Failed to load entity");
                    continue;
                }
            };

            let neighbors = match self.store.get_neighbors(&entity.uri, self.neighbor_limit).await {
                Ok(neighbors) => neighbors,
                Err(e) => {
                    warn!(uri = %entity.uri, error = %e, "Failed to load relations");
                    Vec::new()
                }
            };

            blocks.push(render_block(&entity, &neighbors, &self.labels));
        }

        debug!(candidates = candidates.len(), blocks = blocks.len(), "Context expanded");
        blocks.join("\n\n")
    }
}

/// Render a single entity block.
///
/// Every line ends with a newline except the last relation line.
pub fn render_block(entity: &KnowledgeEntity, neighbors: &[Neighbor], labels: &ContextLabels) -> String {
    let mut block = format!("--- {}: {} ---\n", labels.term, entity.label);

    let attributes = [
        (labels.definition, &entity.definition),
        (labels.rationale, &entity.rationale),
        (labels.guidance, &entity.guidance),
        (labels.example, &entity.example),
    ];
    for (name, value) in attributes {
        if let Some(value) = non_empty(value) {
            block.push_str(&format!("{}: {}\n", name, value));
        }
    }

    if !neighbors.is_empty() {
        let links: Vec<String> = neighbors
            .iter()
            .map(|n| format!(" -> [{}] -> {}", n.relationship_name(), n.label))
            .collect();
        block.push_str(&format!("{}:\n", labels.relations));
        block.push_str(&links.join("\n"));
    }

    block
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
