//! Embedding provider implementations

mod http;

use std::sync::Arc;
use std::time::Duration;

pub use http::HttpEmbedder;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::domain::vector::{Embedder, HashingEmbedder};
use crate::error::{Error, Result};

/// Build the embedder selected by configuration
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let api_key = match config.provider {
        EmbeddingProvider::Hash => None,
        EmbeddingProvider::Http => config
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?,
    };
    embedder_with_key(config, api_key)
}

/// Build the configured embedder with an already resolved API key
fn embedder_with_key(
    config: &EmbeddingConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        EmbeddingProvider::Http => {
            let api_key = api_key.ok_or_else(|| {
                Error::ConfigError(
                    "embedding.provider is 'http' but no API key is set \
                     (ONTORAG_EMBEDDING_API_KEY or OPENAI_API_KEY)"
                        .to_string(),
                )
            })?;

            let embedder = HttpEmbedder::new(
                &config.base_url,
                api_key,
                &config.model,
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Arc::new(embedder))
        }
    }
}
