//! The embedding capability seam.
//!
//! Every backend is hidden behind [`EmbeddingProvider`]; the pipeline only
//! ever sees `{name, dimension, embed}`. Multiple providers run side by
//! side, one lane per configured model.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{EmbedBackend, EmbedderConfig};
use crate::error::Result;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiCompatProvider;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model name; doubles as the lane identity in checkpoints.
    fn model_name(&self) -> &str;

    /// Declared vector dimension for this model.
    fn dimension(&self) -> usize;

    /// Embed one abstract. A vector of the wrong length is an error,
    /// never a value.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Construct a provider from its configuration.
pub fn build_provider(cfg: EmbedderConfig) -> Arc<dyn EmbeddingProvider> {
    match cfg.backend {
        EmbedBackend::Ollama => Arc::new(OllamaProvider::new(cfg)),
        EmbedBackend::OpenAiCompat => Arc::new(OpenAiCompatProvider::new(cfg)),
    }
}

/// Length check shared by all backends.
pub(crate) fn check_dimension(model: &str, expected: usize, vector: Vec<f32>) -> Result<Vec<f32>> {
    if vector.len() == expected {
        Ok(vector)
    } else {
        Err(crate::error::EmbedError::DimensionMismatch {
            model: model.to_string(),
            expected,
            actual: vector.len(),
        })
    }
}
