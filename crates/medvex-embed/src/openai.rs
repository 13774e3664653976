//! OpenAI-compatible embedding backend (any `/v1/embeddings` endpoint).

use serde::Deserialize;
use tracing::debug;

use crate::config::EmbedderConfig;
use crate::error::{classify_status, classify_transport, EmbedError, Result};
use crate::provider::{check_dimension, EmbeddingProvider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dim: usize,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
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
            api_key: cfg.api_key,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Deserialize)]
struct EmbeddingsDatum {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiCompatProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({ "model": &self.model, "input": [text] });

        let mut req = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(classify_transport)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: EmbeddingsResponse = resp.json().await.map_err(classify_transport)?;
        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Malformed("response carried no embeddings".to_string()))?;
        debug!(model = %self.model, len = text.len(), "embedding generated");
        check_dimension(&self.model, self.dim, datum.embedding)
    }
}
