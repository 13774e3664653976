//! Backend configuration for embedding providers.

use serde::{Deserialize, Serialize};

/// Which HTTP API shape the backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedBackend {
    /// `POST {base}/api/embeddings` with `{model, prompt}`.
    Ollama,
    /// Any `/v1/embeddings` endpoint (OpenAI, Groq, Together, …).
    #[serde(rename = "openai-compat")]
    OpenAiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub backend: EmbedBackend,
    /// Model name as the backend knows it, e.g. `bge-m3`.
    pub model: String,
    /// Declared vector dimension. Fixed at first use; every response is
    /// checked against it.
    pub dim: usize,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: EmbedBackend::Ollama,
            model: "bge-m3".to_string(),
            dim: 1024,
            base_url: None,
            api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_ollama_bgem3() {
        let cfg = EmbedderConfig::default();
        assert_eq!(cfg.backend, EmbedBackend::Ollama);
        assert_eq!(cfg.dim, 1024);
    }

    #[test]
    fn test_backend_deserializes_kebab_case() {
        let b: EmbedBackend = serde_json::from_str("\"openai-compat\"").unwrap();
        assert_eq!(b, EmbedBackend::OpenAiCompat);
    }
}
