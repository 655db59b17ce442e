//! Ontology ingestion pipeline
//!
//! Rebuilds the knowledge base from a Turtle source: clears the graph and
//! the vector collection, loads every namespaced subject as an entity with
//! an embedding, then links rules to the characteristics they support.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::knowledge::{
    ContextLabels, EntityStore, KnowledgeEntity, KnowledgeRelationship, uri_fragment,
};
use crate::domain::vector::{EmbeddingMetadata, EmbeddingRecord, VectorIndex};
use crate::error::Result;

use super::ontology::OntologyGraph;

/// Namespace and predicate names that define the domain vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyVocabulary {
    pub namespace: String,
    pub rationale: String,
    pub guidance: String,
    pub example: String,
    pub supports: String,
}

impl Default for OntologyVocabulary {
    fn default() -> Self {
        Self {
            namespace: "http://incose.org/guide/ru#".to_string(),
            rationale: "hasRationale".to_string(),
            guidance: "hasGuidance".to_string(),
            example: "hasExample".to_string(),
            supports: "supportsCharacteristic".to_string(),
        }
    }
}

impl OntologyVocabulary {
    /// Full IRI of a predicate local name
    pub fn iri(&self, local: &str) -> String {
        format!("{}{}", self.namespace, local)
    }

    pub fn in_namespace(&self, iri: &str) -> bool {
        iri.starts_with(&self.namespace)
    }
}

/// Counters reported after an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Distinct triples in the source
    pub triples_parsed: usize,
    pub entities_ingested: usize,
    pub relationships_created: usize,
    /// Support edges whose endpoint is not an ingested entity
    pub relationships_skipped: usize,
    pub duration_ms: u64,
}

/// Loads an ontology into an entity store and a vector index
pub struct IngestionPipeline<S: EntityStore + ?Sized, V: VectorIndex + ?Sized> {
    store: Arc<S>,
    index: Arc<V>,
    vocabulary: OntologyVocabulary,
    labels: ContextLabels,
}

impl<S: EntityStore + ?Sized, V: VectorIndex + ?Sized> IngestionPipeline<S, V> {
    pub fn new(store: Arc<S>, index: Arc<V>) -> Self {
        Self {
            store,
            index,
            vocabulary: OntologyVocabulary::default(),
            labels: ContextLabels::default(),
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: OntologyVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Section words used in embedding documents
    pub fn with_labels(mut self, labels: ContextLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Replace the knowledge base contents with the ontology at `path`.
    ///
    /// The store and collection are cleared first; a missing or malformed
    /// source then aborts the run and leaves them empty.
    pub async fn ingest(&self, path: &Path) -> Result<IngestReport> {
        let started = Instant::now();
        info!(source = %path.display(), "Starting ontology ingestion");

        self.reset().await?;
        let graph = OntologyGraph::parse_file(path)?;
        info!(triples = graph.len(), "Ontology loaded");

        let mut report = self.load(&graph).await?;
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            entities = report.entities_ingested,
            relationships = report.relationships_created,
            skipped = report.relationships_skipped,
            duration_ms = report.duration_ms,
            "Ontology ingestion completed"
        );
        Ok(report)
    }

    /// Same as [`ingest`](Self::ingest) for Turtle text already in memory
    pub async fn ingest_turtle(&self, turtle: &str) -> Result<IngestReport> {
        let started = Instant::now();
        self.reset().await?;
        let graph = OntologyGraph::parse_str(turtle)?;
        let mut report = self.load(&graph).await?;
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    async fn reset(&self) -> Result<()> {
        self.store.clear().await?;
        self.index.delete_collection().await?;
        self.index.ensure_collection().await
    }

    async fn load(&self, graph: &OntologyGraph) -> Result<IngestReport> {
        let mut report = IngestReport {
            triples_parsed: graph.len(),
            ..Default::default()
        };

        report.entities_ingested = self.load_entities(graph).await?;
        let (created, skipped) = self.load_relationships(graph).await?;
        report.relationships_created = created;
        report.relationships_skipped = skipped;

        Ok(report)
    }

    async fn load_entities(&self, graph: &OntologyGraph) -> Result<usize> {
        let rationale = self.vocabulary.iri(&self.vocabulary.rationale);
        let guidance = self.vocabulary.iri(&self.vocabulary.guidance);
        let example = self.vocabulary.iri(&self.vocabulary.example);

        let mut processed: HashSet<&str> = HashSet::new();
        for triple in graph.triples() {
            let Some(subject) = triple.subject.as_deref() else {
                continue;
            };
            if !self.vocabulary.in_namespace(subject) || !processed.insert(subject) {
                continue;
            }

            let label = graph.label(subject).unwrap_or_else(|| uri_fragment(subject));
            let mut entity = KnowledgeEntity::new(subject, label);
            entity.definition = graph.comment(subject).map(String::from);
            entity.rationale = graph.first_value(subject, &rationale).map(String::from);
            entity.guidance = graph.first_value(subject, &guidance).map(String::from);
            entity.example = graph.first_value(subject, &example).map(String::from);

            self.store.save_entity(&entity).await?;
            self.index.upsert(&self.embedding_record(&entity)).await?;
            debug!(uri = %entity.uri, entity_type = %entity.entity_type, "Entity ingested");
        }

        Ok(processed.len())
    }

    async fn load_relationships(&self, graph: &OntologyGraph) -> Result<(usize, usize)> {
        let supports = self.vocabulary.iri(&self.vocabulary.supports);
        let display_name = graph.label(&supports).map(String::from);

        let mut created = 0;
        let mut skipped = 0;
        for triple in graph.triples() {
            if triple.predicate != supports {
                continue;
            }
            let (Some(source), Some(target)) = (triple.subject.as_deref(), triple.object.as_iri())
            else {
                continue;
            };
            if !self.vocabulary.in_namespace(source) || !self.vocabulary.in_namespace(target) {
                continue;
            }

            let mut relationship = KnowledgeRelationship::supports(source, target);
            relationship.display_name = display_name.clone();

            if self.store.save_relationship(&relationship).await? {
                created += 1;
            } else {
                skipped += 1;
            }
        }

        Ok((created, skipped))
    }

    fn embedding_record(&self, entity: &KnowledgeEntity) -> EmbeddingRecord {
        let document = format!(
            "{}. {}: {}. {}: {}. {}: {}",
            entity.label,
            self.labels.definition,
            entity.definition.as_deref().unwrap_or_default(),
            self.labels.rationale,
            entity.rationale.as_deref().unwrap_or_default(),
            self.labels.example,
            entity.example.as_deref().unwrap_or_default(),
        );

        EmbeddingRecord {
            id: entity.uri.clone(),
            document,
            metadata: EmbeddingMetadata {
                uri: entity.uri.clone(),
                label: entity.label.clone(),
                entity_type: entity.entity_type.to_string(),
            },
        }
    }
}
