//! Error types for ontorag

use thiserror::Error;

/// Result type alias using ontorag's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Ontorag error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Entity '{0}' not found. Run `ontorag stats` to check the knowledge base is populated.")]
    EntityNotFound(String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check that the embedding endpoint is reachable.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    // Vector index errors (E200-E299)
    #[error("Vector collection '{0}' not found. Run `ontorag ingest` to build it.")]
    CollectionNotFound(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    // Ontology errors (E300-E399)
    #[error("Ontology source '{0}' not found.")]
    OntologySourceNotFound(String),

    #[error("Failed to parse ontology: {0}")]
    OntologyParse(String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::EntityNotFound(_) => "E001",
            Self::NetworkError(_) => "E100",
            Self::EmbeddingFailed(_) => "E101",
            Self::CollectionNotFound(_) => "E200",
            Self::VectorIndex(_) => "E201",
            Self::OntologySourceNotFound(_) => "E300",
            Self::OntologyParse(_) => "E301",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::EntityNotFound(_) => Some("ontorag stats".to_string()),
            Self::NetworkError(_) => Some("ontorag config get embedding.base_url".to_string()),
            Self::EmbeddingFailed(_) => {
                Some("Set ONTORAG_EMBEDDING_API_KEY or switch to the hash provider".to_string())
            }
            Self::CollectionNotFound(_) => Some("ontorag ingest".to_string()),
            Self::OntologySourceNotFound(_) => Some("ontorag config get ingest.source".to_string()),
            Self::ConfigError(_) => Some("ontorag config list".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::EntityNotFound("x".into()).code(), "E001");
        assert_eq!(Error::CollectionNotFound("kb".into()).code(), "E200");
        assert_eq!(Error::OntologyParse("bad".into()).code(), "E301");
        assert_eq!(Error::Other("?".into()).code(), "E9999");
    }

    #[test]
    fn test_error_suggestions() {
        assert_eq!(
            Error::CollectionNotFound("kb".into()).suggestion(),
            Some("ontorag ingest".to_string())
        );
        assert!(Error::InvalidInput("bad".into()).suggestion().is_none());
    }

    #[test]
    fn test_error_display() {
        let err = Error::CollectionNotFound("incose_rules".into());
        assert!(err.to_string().contains("incose_rules"));
        assert!(err.to_string().contains("ontorag ingest"));
    }
}
