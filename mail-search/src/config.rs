use crate::error::{Result, SearchError};
use crate::search::{FusionWeights, SearchSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
    #[serde(default)]
    pub vector_store: VectorStoreKind,
}

/// Where embedding vectors are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// Table in the message database
    #[default]
    Sqlite,
    /// Process memory; lost on restart
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Ollama,
    Mock,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub base_url: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    pub score_threshold: f32,
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    pub default_max_results: usize,
    pub max_results_limit: usize,
    pub max_query_length: usize,
}

impl SearchConfig {
    /// Clamp a requested result count to `[1, max_results_limit]`
    pub fn clamp_max_results(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_results)
            .clamp(1, self.max_results_limit.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SearchError::Config(e.to_string()))?;

        let config: Self = toml::from_str(&content).map_err(|e| SearchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MAIL_SEARCH_DATABASE_URL") {
            self.storage.database_url = url;
        }
        if let Some(addr) = lookup("MAIL_SEARCH_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.embedding.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_EMBED_MODEL") {
            self.embedding.model = model;
        }
        if let Some(flag) = lookup("USE_OLLAMA") {
            self.embedding.provider = match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => EmbeddingProviderKind::Ollama,
                _ => EmbeddingProviderKind::Mock,
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if !(0.0..=1.0).contains(&search.score_threshold) {
            return Err(SearchError::Config(format!(
                "search.score_threshold must be within [0, 1], got {}",
                search.score_threshold
            )));
        }
        if search.semantic_weight < 0.0 || search.keyword_weight < 0.0 {
            return Err(SearchError::Config("search weights must not be negative".to_string()));
        }
        if search.max_results_limit == 0 || search.default_max_results == 0 {
            return Err(SearchError::Config("search result limits must be at least 1".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(SearchError::Config("embedding.dimensions must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Pipeline settings derived from the `[search]` section
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            score_threshold: self.search.score_threshold,
            weights: FusionWeights {
                semantic: self.search.semantic_weight,
                keyword: self.search.keyword_weight,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "127.0.0.1:8090".to_string(),
            },
            storage: StorageConfig {
                database_url: "sqlite://mail-search.db".to_string(),
                vector_store: VectorStoreKind::Sqlite,
            },
            embedding: EmbeddingConfig {
                provider: EmbeddingProviderKind::Mock,
                model: "nomic-embed-text".to_string(),
                base_url: "http://localhost:11434".to_string(),
                dimensions: 768,
            },
            search: SearchConfig {
                score_threshold: 0.3,
                semantic_weight: 0.6,
                keyword_weight: 0.4,
                default_max_results: 20,
                max_results_limit: 100,
                max_query_length: 500,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
