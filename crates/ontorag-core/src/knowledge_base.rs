//! Knowledge base facade
//!
//! Owns the SQLite pool and wires the entity store, vector index and
//! embedder together according to [`Config`]. Open it once, hand out
//! retrievers and pipelines, and `close()` it when done.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::domain::knowledge::{
    ContextLabels, EntityStore, KnowledgeRetriever, OntologyCatalog, RetrieverConfig,
};
use crate::domain::vector::VectorIndex;
use crate::error::{Error, Result};
use crate::infrastructure::embedding::build_embedder;
use crate::infrastructure::knowledge::SqliteEntityStore;
use crate::infrastructure::vector::SqliteVectorIndex;
use crate::ingest::{IngestReport, IngestionPipeline, OntologyVocabulary};
use crate::routing::QuestionRouter;
use crate::storage::{Database, DatabaseConfig};

pub type Retriever = KnowledgeRetriever<SqliteEntityStore, SqliteVectorIndex>;
pub type Pipeline = IngestionPipeline<SqliteEntityStore, SqliteVectorIndex>;

/// Counts describing the knowledge base contents
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeBaseStats {
    pub database_path: PathBuf,
    pub collection: String,
    pub entities: u64,
    pub relationships: u64,
    pub embeddings: u64,
    pub entities_by_type: Vec<(String, u64)>,
}

/// An open knowledge base
pub struct KnowledgeBase {
    database: Database,
    store: Arc<SqliteEntityStore>,
    index: Arc<SqliteVectorIndex>,
    config: Config,
}

impl KnowledgeBase {
    /// Open the database named by `config`, run migrations and make sure
    /// the vector collection exists
    pub async fn open(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("{:#}", e)))?;

        let path = config
            .database_path()
            .map_err(|e| Error::ConfigError(format!("{:#}", e)))?;

        let database = Database::new(
            DatabaseConfig::with_path(path).max_connections(config.storage.max_connections),
        )
        .await
        .map_err(|e| Error::ConfigError(format!("{:#}", e)))?;

        Self::with_database(database, config).await
    }

    /// Build on an already opened database (e.g. [`Database::in_memory`])
    pub async fn with_database(database: Database, config: &Config) -> Result<Self> {
        database
            .health_check()
            .await
            .map_err(|e| Error::ConfigError(format!("{:#}", e)))?;

        let embedder = build_embedder(&config.embedding)?;
        let store = Arc::new(SqliteEntityStore::new(database.pool().clone()));
        let index = Arc::new(SqliteVectorIndex::new(
            database.pool().clone(),
            &config.retrieval.collection,
            embedder,
        ));
        index.ensure_collection().await?;

        info!(
            database = %database.path().display(),
            collection = %config.retrieval.collection,
            provider = %config.embedding.provider.as_str(),
            "Knowledge base opened"
        );

        Ok(Self {
            database,
            store,
            index,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn store(&self) -> Arc<SqliteEntityStore> {
        self.store.clone()
    }

    pub fn index(&self) -> Arc<SqliteVectorIndex> {
        self.index.clone()
    }

    fn labels(&self) -> ContextLabels {
        ContextLabels::for_language(self.config.retrieval.language)
    }

    pub fn retriever(&self) -> Retriever {
        let retrieval = &self.config.retrieval;
        let config = RetrieverConfig {
            top_k: retrieval.top_k,
            neighbor_limit: retrieval.neighbor_limit,
            exact_match: retrieval.exact_match,
            language: retrieval.language,
        };
        KnowledgeRetriever::with_config(self.store.clone(), self.index.clone(), config)
    }

    pub fn pipeline(&self) -> Pipeline {
        let ingest = &self.config.ingest;
        let vocabulary = OntologyVocabulary {
            namespace: ingest.namespace.clone(),
            rationale: ingest.rationale_predicate.clone(),
            guidance: ingest.guidance_predicate.clone(),
            example: ingest.example_predicate.clone(),
            supports: ingest.supports_predicate.clone(),
        };
        IngestionPipeline::new(self.store.clone(), self.index.clone())
            .with_vocabulary(vocabulary)
            .with_labels(self.labels())
    }

    pub fn catalog(&self) -> OntologyCatalog<SqliteEntityStore> {
        OntologyCatalog::new(self.store.clone())
    }

    pub fn router(&self) -> QuestionRouter {
        QuestionRouter::from_config(&self.config.routing)
    }

    /// Context text for a query; see [`KnowledgeRetriever::search`]
    pub async fn search(&self, query: &str) -> String {
        self.retriever().search(query).await
    }

    /// Ingest `source`, or the configured default source
    pub async fn ingest(&self, source: Option<&Path>) -> Result<IngestReport> {
        let path = source.unwrap_or(self.config.ingest.source.as_path());
        self.pipeline().ingest(path).await
    }

    pub async fn stats(&self) -> Result<KnowledgeBaseStats> {
        let graph = self.store.get_stats().await?;
        let embeddings = self.index.count().await?;

        Ok(KnowledgeBaseStats {
            database_path: self.database.path().to_path_buf(),
            collection: self.index.collection().to_string(),
            entities: graph.total_entities,
            relationships: graph.total_relationships,
            embeddings,
            entities_by_type: graph
                .entities_by_type
                .into_iter()
                .map(|(t, c)| (t.to_string(), c))
                .collect(),
        })
    }

    /// Release the connection pool
    pub async fn close(self) {
        self.database.close().await;
        info!("Knowledge base closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProvider;
    use crate::domain::knowledge::ContextLanguage;
    use crate::routing::AgentRole;
    use tempfile::TempDir;

    const TURTLE: &str = r#"
        @prefix : <http://incose.org/guide/ru#> .
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

        :R1 rdfs:label "R1" ;
            rdfs:comment "Структура требования" ;
            :hasExample "Система должна..." ;
            :supportsCharacteristic :C1 .
        :C1 rdfs:label "C1" ;
            rdfs:comment "Необходимость" .
    "#;

    async fn open_in_memory(config: &Config) -> KnowledgeBase {
        let database = Database::in_memory().await.unwrap();
        KnowledgeBase::with_database(database, config).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_database_file() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(dir.path().join("kb.db"));

        let kb = KnowledgeBase::open(&config).await.unwrap();
        let stats = kb.stats().await.unwrap();
        assert_eq!(stats.entities, 0);
        assert_eq!(stats.collection, "incose_rules");
        kb.close().await;

        assert!(dir.path().join("kb.db").exists());
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;

        let err = KnowledgeBase::open(&config).await.err().unwrap();
        assert_eq!(err.code(), "E600");
    }

    #[tokio::test]
    async fn test_http_provider_with_stored_key_fails() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProvider::Http;
        config.embedding.api_key = Some("stored".into());

        let database = Database::in_memory().await.unwrap();
        let err = KnowledgeBase::with_database(database, &config).await.err().unwrap();
        assert_eq!(err.code(), "E600");
        assert!(err.to_string().contains("environment variables"));
    }

    #[tokio::test]
    async fn test_ingest_search_and_stats() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("onto.ttl");
        std::fs::write(&source, TURTLE).unwrap();

        let kb = open_in_memory(&Config::default()).await;
        let report = kb.ingest(Some(&source)).await.unwrap();
        assert_eq!(report.entities_ingested, 2);
        assert_eq!(report.relationships_created, 1);

        let context = kb.search("Расскажи про R1").await;
        assert!(context.starts_with("--- ТЕРМИН: R1 ---\nОпределение: Структура требования\n"));
        assert!(context.contains(" -> [SUPPORTS] -> C1"));

        let stats = kb.stats().await.unwrap();
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.relationships, 1);
        assert_eq!(stats.embeddings, 2);

        let rules = kb.catalog().rules_text().await.unwrap();
        assert!(rules.contains("- R1. (Пример: Система должна...)"));
    }

    #[tokio::test]
    async fn test_english_configuration() {
        let mut config = Config::default();
        config.retrieval.language = ContextLanguage::English;

        let kb = open_in_memory(&config).await;
        assert_eq!(
            kb.search("nothing here").await,
            "No information found in the knowledge base for this query."
        );
    }

    #[tokio::test]
    async fn test_router_uses_config() {
        let mut config = Config::default();
        config.routing.expert_keywords = vec!["ISO".into()];

        let kb = open_in_memory(&config).await;
        assert_eq!(kb.router().route("ISO 29148"), AgentRole::Expert);
        assert_eq!(kb.router().route("ГОСТ"), AgentRole::Architect);
    }
}
