//! Ollama embedding backend (`/api/embeddings`).

use serde::Deserialize;
use tracing::debug;

use crate::config::EmbedderConfig;
use crate::error::{classify_status, classify_transport, Result};
use crate::provider::{check_dimension, EmbeddingProvider};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dim: usize,
}

impl OllamaProvider {
    pub fn new(cfg: EmbedderConfig) -> Self {
        let base_url = cfg
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            model: cfg.model,
            dim: cfg.dim,
        }
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = serde_json::json!({ "model": &self.model, "prompt": text });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: OllamaResponse = resp.json().await.map_err(classify_transport)?;
        debug!(model = %self.model, len = text.len(), "embedding generated");
        check_dimension(&self.model, self.dim, parsed.embedding)
    }
}
