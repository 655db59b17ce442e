//! Knowledge retriever
//!
//! `search(query)` is the entry point used by the expert agent. It collects
//! candidate entities (explicit identifiers first, then vector similarity),
//! expands them through the graph and returns plain text. Backend failures
//! degrade the answer but never surface as errors.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::vector::{VectorCandidate, VectorIndex, VectorLookup};

use super::context::{ContextExpander, ContextLabels, ContextLanguage, DEFAULT_NEIGHBOR_LIMIT};
use super::repository::EntityStore;

/// Rule and characteristic identifiers, e.g. "R12" or "C3"
static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([RC][0-9]+)\b").expect("identifier pattern is valid"));

/// Default number of vector candidates per query
pub const DEFAULT_TOP_K: usize = 3;

/// Similarity assigned to entities found by explicit identifier
const EXACT_MATCH_SIMILARITY: f32 = 1.0;

/// Retrieval tuning
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Number of vector candidates per query
    pub top_k: usize,
    /// Maximum relations listed per entity
    pub neighbor_limit: usize,
    /// Resolve identifiers mentioned in the query before vector search
    pub exact_match: bool,
    pub language: ContextLanguage,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            neighbor_limit: DEFAULT_NEIGHBOR_LIMIT,
            exact_match: true,
            language: ContextLanguage::default(),
        }
    }
}

/// Everything a search produced, for callers that need more than the text
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    /// Context text, or the not-found sentinel
    pub context: String,
    /// Whether any entity block was produced
    pub found: bool,
    /// Candidates in the order they were expanded (before deduplication)
    pub candidates: Vec<VectorCandidate>,
    /// Identifiers extracted from the query
    pub identifiers: Vec<String>,
    /// Why the vector index could not answer, if it couldn't
    pub vector_unavailable: Option<String>,
}

/// Assembles context for a query from the vector index and the graph
pub struct KnowledgeRetriever<S: EntityStore + ?Sized, V: VectorIndex + ?Sized> {
    store: Arc<S>,
    index: Arc<V>,
    expander: ContextExpander<S>,
    config: RetrieverConfig,
}

impl<S: EntityStore + ?Sized, V: VectorIndex + ?Sized> KnowledgeRetriever<S, V> {
    pub fn new(store: Arc<S>, index: Arc<V>) -> Self {
        Self::with_config(store, index, RetrieverConfig::default())
    }

    pub fn with_config(store: Arc<S>, index: Arc<V>, config: RetrieverConfig) -> Self {
        let expander = ContextExpander::new(store.clone())
            .with_labels(ContextLabels::for_language(config.language))
            .with_neighbor_limit(config.neighbor_limit);

        Self {
            store,
            index,
            expander,
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Context text for `query`, or the not-found sentinel
    pub async fn search(&self, query: &str) -> String {
        self.search_detailed(query).await.context
    }

    /// Like [`search`](Self::search) but keeps the intermediate results
    pub async fn search_detailed(&self, query: &str) -> SearchOutcome {
        let identifiers = if self.config.exact_match {
            extract_ids(query)
        } else {
            Vec::new()
        };

        let mut candidates = self.resolve_identifiers(&identifiers).await;

        let lookup = self.query_vector(query, self.config.top_k).await;
        let vector_unavailable = match &lookup {
            VectorLookup::Unavailable(reason) => Some(reason.clone()),
            VectorLookup::Hits(_) => None,
        };
        candidates.extend(lookup.into_candidates());

        let expanded = self.expander.expand(&candidates).await;
        let found = !expanded.is_empty();
        let context = if found {
            expanded
        } else {
            self.expander.labels().not_found.to_string()
        };

        info!(
            identifiers = identifiers.len(),
            candidates = candidates.len(),
            found,
            "Knowledge search completed"
        );

        SearchOutcome {
            query: query.to_string(),
            context,
            found,
            candidates,
            identifiers,
            vector_unavailable,
        }
    }

    /// Top `top_n` candidates by similarity; failures become `Unavailable`
    pub async fn query_vector(&self, query: &str, top_n: usize) -> VectorLookup {
        match self.index.query(query, top_n).await {
            Ok(hits) => {
                debug!(hits = hits.len(), "Vector query returned");
                VectorLookup::Hits(hits)
            }
            Err(e) => {
                warn!(collection = %self.index.collection(), error = %e, "Vector index unavailable");
                VectorLookup::Unavailable(e.to_string())
            }
        }
    }

    /// Entities whose label equals one of the identifiers
    async fn resolve_identifiers(&self, identifiers: &[String]) -> Vec<VectorCandidate> {
        let mut candidates = Vec::new();
        for id in identifiers {
            match self.store.find_entity_by_label(id).await {
                Ok(Some(entity)) => {
                    candidates.push(VectorCandidate::new(
                        entity.uri,
                        entity.label,
                        EXACT_MATCH_SIMILARITY,
                    ));
                }
                Ok(None) => debug!(identifier = %id, "Identifier not in graph"),
                Err(e) => warn!(identifier = %id, error = %e, "Identifier lookup failed"),
            }
        }
        candidates
    }
}

/// Identifiers like "R1" or "C12" mentioned in `text`, upper-cased,
/// deduplicated, in order of first appearance
pub fn extract_ids(text: &str) -> Vec<String> {
    let upper = text.to_uppercase();
    let mut ids: Vec<String> = Vec::new();
    for capture in ID_PATTERN.captures_iter(&upper) {
        let id = &capture[1];
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::{KnowledgeEntity, KnowledgeRelationship};
    use crate::domain::vector::{EmbeddingMetadata, EmbeddingRecord, HashingEmbedder};
    use crate::error::{Error, Result};
    use crate::infrastructure::knowledge::SqliteEntityStore;
    use crate::infrastructure::vector::SqliteVectorIndex;
    use crate::storage::migrations::run_migrations;
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;

    const NS: &str = "http://incose.org/guide/ru#";

    struct Fixture {
        store: Arc<SqliteEntityStore>,
        index: Arc<SqliteVectorIndex>,
    }

    async fn setup() -> Fixture {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        Fixture {
            store: Arc::new(SqliteEntityStore::new(pool.clone())),
            index: Arc::new(SqliteVectorIndex::new(
                pool,
                "incose_rules",
                Arc::new(HashingEmbedder::new(128)),
            )),
        }
    }

    async fn add(fixture: &Fixture, entity: KnowledgeEntity, document: &str) {
        fixture.store.save_entity(&entity).await.unwrap();
        fixture
            .index
            .upsert(&EmbeddingRecord {
                id: entity.uri.clone(),
                document: document.to_string(),
                metadata: EmbeddingMetadata {
                    uri: entity.uri.clone(),
                    label: entity.label.clone(),
                    entity_type: entity.entity_type.to_string(),
                },
            })
            .await
            .unwrap();
    }

    /// Vector index that always returns the same hits
    struct FixedIndex(Vec<VectorCandidate>);

    #[async_trait]
    impl VectorIndex for FixedIndex {
        fn collection(&self) -> &str {
            "fixed"
        }
        async fn ensure_collection(&self) -> Result<()> {
            Ok(())
        }
        async fn delete_collection(&self) -> Result<()> {
            Ok(())
        }
        async fn upsert(&self, _record: &EmbeddingRecord) -> Result<()> {
            Ok(())
        }
        async fn query(&self, _text: &str, top_n: usize) -> Result<Vec<VectorCandidate>> {
            Ok(self.0.iter().take(top_n).cloned().collect())
        }
        async fn count(&self) -> Result<u64> {
            Ok(self.0.len() as u64)
        }
    }

    /// Vector index that always fails
    struct BrokenIndex;

    #[async_trait]
    impl VectorIndex for BrokenIndex {
        fn collection(&self) -> &str {
            "broken"
        }
        async fn ensure_collection(&self) -> Result<()> {
            Err(Error::VectorIndex("down".into()))
        }
        async fn delete_collection(&self) -> Result<()> {
            Err(Error::VectorIndex("down".into()))
        }
        async fn upsert(&self, _record: &EmbeddingRecord) -> Result<()> {
            Err(Error::VectorIndex("down".into()))
        }
        async fn query(&self, _text: &str, _top_n: usize) -> Result<Vec<VectorCandidate>> {
            Err(Error::VectorIndex("down".into()))
        }
        async fn count(&self) -> Result<u64> {
            Err(Error::VectorIndex("down".into()))
        }
    }

    #[test]
    fn test_extract_ids() {
        assert_eq!(extract_ids("Поясни правило r1 и C12"), vec!["R1", "C12"]);
        assert_eq!(extract_ids("R1, R1 and R2"), vec!["R1", "R2"]);
        assert!(extract_ids("R and C without digits, AR1X").is_empty());
        assert!(extract_ids("").is_empty());
    }

    #[tokio::test]
    async fn test_sentinel_when_collection_missing() {
        let fixture = setup().await;
        let retriever = KnowledgeRetriever::new(fixture.store.clone(), fixture.index.clone());

        let outcome = retriever.search_detailed("что угодно").await;
        assert!(!outcome.found);
        assert_eq!(outcome.context, ContextLabels::RUSSIAN.not_found);
        assert!(outcome.vector_unavailable.is_some());
    }

    #[tokio::test]
    async fn test_query_vector_reports_unavailable() {
        let fixture = setup().await;
        let retriever = KnowledgeRetriever::new(fixture.store.clone(), Arc::new(BrokenIndex));

        let lookup = retriever.query_vector("x", 3).await;
        assert!(matches!(lookup, VectorLookup::Unavailable(_)));
        assert_eq!(retriever.search("x").await, ContextLabels::RUSSIAN.not_found);
    }

    #[tokio::test]
    async fn test_search_renders_vector_hits_with_relations() {
        let fixture = setup().await;
        fixture.index.ensure_collection().await.unwrap();

        add(
            &fixture,
            KnowledgeEntity::new(format!("{NS}R2"), "R2").with_definition("Единицы измерения"),
            "R2. Определение: Единицы измерения",
        )
        .await;
        add(
            &fixture,
            KnowledgeEntity::new(format!("{NS}C1"), "C1").with_definition("Необходимость"),
            "C1. Определение: Необходимость",
        )
        .await;
        fixture
            .store
            .save_relationship(&KnowledgeRelationship::supports(
                format!("{NS}R2"),
                format!("{NS}C1"),
            ))
            .await
            .unwrap();

        let config = RetrieverConfig {
            top_k: 1,
            ..Default::default()
        };
        let retriever =
            KnowledgeRetriever::with_config(fixture.store.clone(), fixture.index.clone(), config);

        let context = retriever.search("единицы измерения").await;
        assert_eq!(
            context,
            "--- ТЕРМИН: R2 ---\nОпределение: Единицы измерения\nСвязи:\n -> [SUPPORTS] -> C1"
        );
    }

    #[tokio::test]
    async fn test_duplicate_candidates_render_once() {
        let fixture = setup().await;
        fixture
            .store
            .save_entity(&KnowledgeEntity::new("urn:R1", "R1").with_definition("D"))
            .await
            .unwrap();
        fixture
            .store
            .save_entity(&KnowledgeEntity::new("urn:R2", "R2").with_definition("E"))
            .await
            .unwrap();

        let index = Arc::new(FixedIndex(vec![
            VectorCandidate::new("urn:R1", "R1", 0.9),
            VectorCandidate::new("urn:R2", "R2", 0.8),
            VectorCandidate::new("urn:R1", "R1", 0.7),
        ]));
        let retriever = KnowledgeRetriever::new(fixture.store.clone(), index);

        let context = retriever.search("q").await;
        assert_eq!(context.matches("--- ТЕРМИН: R1 ---").count(), 1);
        assert_eq!(
            context,
            "--- ТЕРМИН: R1 ---\nОпределение: D\n\n\n--- ТЕРМИН: R2 ---\nОпределение: E\n"
        );
    }

    #[tokio::test]
    async fn test_missing_entities_are_skipped() {
        let fixture = setup().await;
        let index = Arc::new(FixedIndex(vec![VectorCandidate::new("urn:ghost", "ghost", 0.9)]));
        let retriever = KnowledgeRetriever::new(fixture.store.clone(), index);

        assert_eq!(retriever.search("q").await, ContextLabels::RUSSIAN.not_found);
    }

    #[tokio::test]
    async fn test_exact_identifier_comes_first() {
        let fixture = setup().await;
        for label in ["R1", "R5"] {
            fixture
                .store
                .save_entity(&KnowledgeEntity::new(format!("urn:{label}"), label))
                .await
                .unwrap();
        }

        let index = Arc::new(FixedIndex(vec![VectorCandidate::new("urn:R1", "R1", 0.9)]));
        let retriever = KnowledgeRetriever::new(fixture.store.clone(), index.clone());

        let outcome = retriever.search_detailed("что говорит r5?").await;
        assert_eq!(outcome.identifiers, vec!["R5"]);
        assert_eq!(outcome.candidates[0].label, "R5");
        assert!(outcome.context.starts_with("--- ТЕРМИН: R5 ---"));
        assert!(outcome.context.contains("--- ТЕРМИН: R1 ---"));

        let config = RetrieverConfig {
            exact_match: false,
            ..Default::default()
        };
        let retriever = KnowledgeRetriever::with_config(fixture.store.clone(), index, config);
        let outcome = retriever.search_detailed("что говорит r5?").await;
        assert!(outcome.identifiers.is_empty());
        assert!(!outcome.context.contains("R5"));
    }

    #[tokio::test]
    async fn test_neighbor_bound() {
        let fixture = setup().await;
        fixture
            .store
            .save_entity(&KnowledgeEntity::new("urn:C1", "C1"))
            .await
            .unwrap();
        for i in 1..=15 {
            let label = format!("R{}", i);
            fixture
                .store
                .save_entity(&KnowledgeEntity::new(format!("urn:{label}"), &label))
                .await
                .unwrap();
            fixture
                .store
                .save_relationship(&KnowledgeRelationship::supports(format!("urn:{label}"), "urn:C1"))
                .await
                .unwrap();
        }

        let index = Arc::new(FixedIndex(vec![VectorCandidate::new("urn:C1", "C1", 0.9)]));
        let retriever = KnowledgeRetriever::new(fixture.store.clone(), index);

        let context = retriever.search("q").await;
        assert_eq!(context.lines().filter(|l| l.starts_with(" -> ")).count(), 10);
    }

    #[tokio::test]
    async fn test_english_sentinel() {
        let fixture = setup().await;
        let config = RetrieverConfig {
            language: ContextLanguage::English,
            ..Default::default()
        };
        let retriever =
            KnowledgeRetriever::with_config(fixture.store.clone(), Arc::new(BrokenIndex), config);
        assert_eq!(
            retriever.search("anything").await,
            "No information found in the knowledge base for this query."
        );
    }
}
