//! SQLite-backed vector index
//!
//! Embeddings are stored as little-endian f32 blobs and scored by brute
//! force cosine similarity. Collections are small (one record per
//! ontology entity), so a full scan per query is fine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info, warn};

use crate::domain::vector::{
    Embedder, EmbeddingMetadata, EmbeddingRecord, VectorCandidate, VectorIndex, cosine_similarity,
};
use crate::error::{Error, Result};

/// Vector index persisted in the `vector_records` table
#[derive(Clone)]
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool, collection: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            pool,
            collection: collection.into(),
            embedder,
        }
    }

    async fn collection_exists(&self) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT embedding_model FROM vector_collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn require_collection(&self) -> Result<()> {
        if self.collection_exists().await? {
            Ok(())
        } else {
            Err(Error::CollectionNotFound(self.collection.clone()))
        }
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self) -> Result<()> {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT embedding_model FROM vector_collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some((model,)) if model != self.embedder.model() => {
                warn!(
                    collection = %self.collection,
                    stored_model = %model,
                    current_model = %self.embedder.model(),
                    "Collection was built with a different embedding model; re-run ingestion"
                );
            }
            Some(_) => {}
            None => {
                sqlx::query(
                    "INSERT INTO vector_collections (name, embedding_model, dimensions, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(&self.collection)
                .bind(self.embedder.model())
                .bind(self.embedder.dimensions().unwrap_or(0) as i64)
                .bind(Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
                info!(collection = %self.collection, model = %self.embedder.model(), "Vector collection created");
            }
        }
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let records = sqlx::query("DELETE FROM vector_records WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM vector_collections WHERE name = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(collection = %self.collection, records, "Vector collection deleted");
        Ok(())
    }

    async fn upsert(&self, record: &EmbeddingRecord) -> Result<()> {
        self.require_collection().await?;

        let embedding = self.embedder.embed(&record.document).await?;
        let embedding_bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
        let metadata_json = serde_json::to_string(&record.metadata)
            .map_err(|e| Error::VectorIndex(format!("Failed to serialize metadata: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO vector_records (collection, id, document, metadata, embedding, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                document = excluded.document,
                metadata = excluded.metadata,
                embedding = excluded.embedding,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.collection)
        .bind(&record.id)
        .bind(&record.document)
        .bind(&metadata_json)
        .bind(&embedding_bytes)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(collection = %self.collection, id = %record.id, "Embedding saved");
        Ok(())
    }

    async fn query(&self, text: &str, top_n: usize) -> Result<Vec<VectorCandidate>> {
        self.require_collection().await?;
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text).await?;

        let rows: Vec<VectorRow> = sqlx::query_as(
            "SELECT id, metadata, embedding FROM vector_records WHERE collection = ? ORDER BY rowid",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let embedding = decode_embedding(&row.embedding).ok_or_else(|| {
                Error::VectorIndex(format!("Malformed embedding for record {}", row.id))
            })?;
            if embedding.len() != query_embedding.len() {
                return Err(Error::VectorIndex(format!(
                    "Record {} has {} dimensions but the embedder produces {}; re-run ingestion",
                    row.id,
                    embedding.len(),
                    query_embedding.len()
                )));
            }
            let similarity = cosine_similarity(&query_embedding, &embedding);
            scored.push((row, similarity));
        }

        // stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);

        scored
            .into_iter()
            .map(|(row, similarity)| {
                let metadata: EmbeddingMetadata = serde_json::from_str(&row.metadata).map_err(|e| {
                    Error::VectorIndex(format!("Malformed metadata for record {}: {}", row.id, e))
                })?;
                Ok(VectorCandidate::new(metadata.uri, metadata.label, similarity))
            })
            .collect()
    }

    async fn count(&self) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM vector_records WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[derive(Debug, FromRow)]
struct VectorRow {
    id: String,
    metadata: String,
    embedding: Vec<u8>,
}
