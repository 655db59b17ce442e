//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::knowledge::ContextLanguage;

/// Ontorag configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; defaults to `ontorag.db` inside the config directory
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

/// Which embedding function backs the vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local feature-hashing embedder, no network access
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint
    Http,
}

impl EmbeddingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Http => "http",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hash" | "hashing" | "local" => Some(Self::Hash),
            "http" | "openai" | "remote" => Some(Self::Http),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub provider: EmbeddingProvider,
    /// Model name sent to the HTTP provider
    pub model: String,
    /// Vector size for the hashing provider
    pub dimensions: usize,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: EmbeddingProvider::Hash,
            model: "text-embedding-3-small".to_string(),
            dimensions: 256,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Name of the vector collection holding entity embeddings
    pub collection: String,
    /// Number of vector candidates per query
    pub top_k: usize,
    /// Maximum relationship lines per entity block
    pub neighbor_limit: usize,
    /// Look up identifiers like "R12" before falling back to vector search
    pub exact_match: bool,
    pub language: ContextLanguage,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: "incose_rules".to_string(),
            top_k: 3,
            neighbor_limit: 10,
            exact_match: true,
            language: ContextLanguage::Russian,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Default Turtle source used when `ingest` is called without a path
    pub source: PathBuf,
    /// Only subjects under this namespace become entities
    pub namespace: String,
    pub rationale_predicate: String,
    pub guidance_predicate: String,
    pub example_predicate: String,
    pub supports_predicate: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("ontology/incose_full.ttl"),
            namespace: "http://incose.org/guide/ru#".to_string(),
            rationale_predicate: "hasRationale".to_string(),
            guidance_predicate: "hasGuidance".to_string(),
            example_predicate: "hasExample".to_string(),
            supports_predicate: "supportsCharacteristic".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Questions containing any of these (case-insensitive) go to the expert agent
    pub expert_keywords: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            expert_keywords: vec![
                "ГОСТ".to_string(),
                "REQUIREMENT".to_string(),
                "ТРЕБОВАНИ".to_string(),
            ],
        }
    }
}

impl EmbeddingConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("ONTORAG_EMBEDDING_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        Ok(self.resolved_api_key()?.map(|key| redact(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Embedding API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

/// Mask all but the last four characters of a key
fn redact(key: &str) -> String {
    match key.char_indices().rev().nth(3) {
        Some((start, _)) if start > 0 => format!("***{}", &key[start..]),
        _ => "***".to_string(),
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("ONTORAG_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("ontorag")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Resolve the database file, falling back to the config directory
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("ontorag.db")),
        }
    }

    /// Load configuration from file, or return defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create config directory: {}", dir.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.embedding.enforce_env_only()?;

        if self.retrieval.top_k == 0 {
            return Err(anyhow!("retrieval.top_k must be at least 1"));
        }
        if self.retrieval.neighbor_limit == 0 {
            return Err(anyhow!("retrieval.neighbor_limit must be at least 1"));
        }
        if self.embedding.dimensions < 8 {
            return Err(anyhow!("embedding.dimensions must be at least 8"));
        }
        if self.ingest.namespace.trim().is_empty() {
            return Err(anyhow!("ingest.namespace must not be empty"));
        }
        if self.storage.max_connections == 0 {
            return Err(anyhow!("storage.max_connections must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // Storage settings
            "storage.path" => Ok(self.database_path()?.display().to_string()),
            "storage.max_connections" => Ok(self.storage.max_connections.to_string()),

            // Embedding settings
            "embedding.provider" => Ok(self.embedding.provider.as_str().to_string()),
            "embedding.model" => Ok(self.embedding.model.clone()),
            "embedding.dimensions" => Ok(self.embedding.dimensions.to_string()),
            "embedding.base_url" => Ok(self.embedding.base_url.clone()),
            "embedding.timeout_secs" => Ok(self.embedding.timeout_secs.to_string()),

            // Retrieval settings
            "retrieval.collection" => Ok(self.retrieval.collection.clone()),
            "retrieval.top_k" => Ok(self.retrieval.top_k.to_string()),
            "retrieval.neighbor_limit" => Ok(self.retrieval.neighbor_limit.to_string()),
            "retrieval.exact_match" => Ok(self.retrieval.exact_match.to_string()),
            "retrieval.language" => Ok(self.retrieval.language.as_str().to_string()),

            // Ingestion settings
            "ingest.source" => Ok(self.ingest.source.display().to_string()),
            "ingest.namespace" => Ok(self.ingest.namespace.clone()),
            "ingest.rationale_predicate" => Ok(self.ingest.rationale_predicate.clone()),
            "ingest.guidance_predicate" => Ok(self.ingest.guidance_predicate.clone()),
            "ingest.example_predicate" => Ok(self.ingest.example_predicate.clone()),
            "ingest.supports_predicate" => Ok(self.ingest.supports_predicate.clone()),

            // Routing settings
            "routing.expert_keywords" => Ok(self.routing.expert_keywords.join(", ")),

            // API key (special handling - show redacted)
            "embedding.api_key" | "api_key" => match self.embedding.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(
                    "(not set - use ONTORAG_EMBEDDING_API_KEY or OPENAI_API_KEY env var)"
                        .to_string(),
                ),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `ontorag config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "storage.path" => {
                self.storage.path = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "storage.max_connections" => {
                let max: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_connections value: {}", value))?;
                if max == 0 {
                    return Err(anyhow!("max_connections must be at least 1"));
                }
                self.storage.max_connections = max;
            }

            "embedding.provider" => {
                self.embedding.provider = EmbeddingProvider::parse(value).ok_or_else(|| {
                    anyhow!("Invalid embedding provider: {}. Valid options: hash, http", value)
                })?;
            }
            "embedding.model" => {
                self.embedding.model = value.to_string();
            }
            "embedding.dimensions" => {
                let dims: usize = value
                    .parse()
                    .with_context(|| format!("Invalid dimensions value: {}", value))?;
                if dims < 8 {
                    return Err(anyhow!("Embedding dimensions must be at least 8"));
                }
                self.embedding.dimensions = dims;
            }
            "embedding.base_url" => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(anyhow!("Embedding base_url must start with http:// or https://"));
                }
                self.embedding.base_url = value.trim_end_matches('/').to_string();
            }
            "embedding.timeout_secs" => {
                self.embedding.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            "retrieval.collection" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Collection name must not be empty"));
                }
                self.retrieval.collection = value.to_string();
            }
            "retrieval.top_k" => {
                let top_k: usize = value
                    .parse()
                    .with_context(|| format!("Invalid top_k value: {}", value))?;
                if top_k == 0 {
                    return Err(anyhow!("top_k must be at least 1"));
                }
                self.retrieval.top_k = top_k;
            }
            "retrieval.neighbor_limit" => {
                let limit: usize = value
                    .parse()
                    .with_context(|| format!("Invalid neighbor_limit value: {}", value))?;
                if limit == 0 {
                    return Err(anyhow!("neighbor_limit must be at least 1"));
                }
                self.retrieval.neighbor_limit = limit;
            }
            "retrieval.exact_match" => {
                self.retrieval.exact_match = value
                    .parse()
                    .with_context(|| format!("Invalid exact_match value: {} (use true/false)", value))?;
            }
            "retrieval.language" => {
                self.retrieval.language = ContextLanguage::parse(value).ok_or_else(|| {
                    anyhow!("Invalid language: {}. Valid options: ru, en", value)
                })?;
            }

            "ingest.source" => {
                self.ingest.source = PathBuf::from(value);
            }
            "ingest.namespace" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Namespace must not be empty"));
                }
                self.ingest.namespace = value.to_string();
            }
            "ingest.rationale_predicate" => {
                self.ingest.rationale_predicate = value.to_string();
            }
            "ingest.guidance_predicate" => {
                self.ingest.guidance_predicate = value.to_string();
            }
            "ingest.example_predicate" => {
                self.ingest.example_predicate = value.to_string();
            }
            "ingest.supports_predicate" => {
                self.ingest.supports_predicate = value.to_string();
            }

            "routing.expert_keywords" => {
                self.routing.expert_keywords = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }

            // API key cannot be set via config
            "embedding.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the ONTORAG_EMBEDDING_API_KEY or OPENAI_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `ontorag config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "storage.path",
            "storage.max_connections",
            "embedding.provider",
            "embedding.model",
            "embedding.dimensions",
            "embedding.base_url",
            "embedding.timeout_secs",
            "embedding.api_key",
            "retrieval.collection",
            "retrieval.top_k",
            "retrieval.neighbor_limit",
            "retrieval.exact_match",
            "retrieval.language",
            "ingest.source",
            "ingest.namespace",
            "ingest.rationale_predicate",
            "ingest.guidance_predicate",
            "ingest.example_predicate",
            "ingest.supports_predicate",
            "routing.expert_keywords",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
