//! Ollama embedding client
//!
//! Calls the `/api/embeddings` endpoint of an Ollama server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::EmbeddingProvider;
use crate::error::{Result, SearchError};

/// Ollama embedding provider
pub struct OllamaEmbedder {
    model_name: String,
    base_url: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(model_name: String, dimensions: usize) -> Self {
        Self {
            model_name,
            base_url: "http://localhost:11434".to_string(),
            dimensions,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

/// Ollama embeddings request
#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Ollama embeddings response
#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("OllamaEmbedder: embedding {} chars with {}", text.len(), self.model_name);

        let request = OllamaEmbeddingRequest {
            model: &self.model_name,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("OllamaEmbedder: request failed with status {}: {}", status, error_text);
            return Err(SearchError::Embedding(format!(
                "Ollama request failed: {} - {}",
                status, error_text
            )));
        }

        let body: OllamaEmbeddingResponse = response.json().await?;

        if body.embedding.is_empty() {
            return Err(SearchError::Embedding("Ollama returned an empty embedding".to_string()));
        }
        if body.embedding.len() != self.dimensions {
            return Err(SearchError::Embedding(format!(
                "Ollama returned {} dimensions, expected {}",
                body.embedding.len(),
                self.dimensions
            )));
        }

        Ok(body.embedding)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
