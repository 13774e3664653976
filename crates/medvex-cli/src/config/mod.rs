//! Configuration loading for Medvex.
//! Reads medvex.toml from the current directory or the path in the
//! MEDVEX_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub archives: ArchivesConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivesConfig {
    /// Inclusive sequence range of baseline files to process.
    pub start: u32,
    pub end: u32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
}

fn default_base_url() -> String {
    medvex_ingestion::fetch::DEFAULT_BASE_URL.to_string()
}
fn default_file_prefix() -> String {
    medvex_ingestion::fetch::DEFAULT_FILE_PREFIX.to_string()
}
fn default_max_articles() -> usize {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

fn default_language() -> String {
    "eng".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name as the backend knows it; also the checkpoint lane name.
    pub name: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    pub dimension: usize,
    pub base_url: Option<String>,
    /// Name of the env var holding the API key, if the backend needs one.
    pub api_key_env: Option<String>,
}

fn default_backend() -> String {
    "ollama".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    pub api_key_env: Option<String>,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
    #[serde(default = "default_distance")]
    pub distance: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key_env: None,
            collection_prefix: default_collection_prefix(),
            distance: default_distance(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection_prefix() -> String {
    "pubmed".to_string()
}
fn default_distance() -> String {
    "cosine".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_checkpoint_path")]
    pub path: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: default_checkpoint_path(),
        }
    }
}

fn default_checkpoint_path() -> String {
    "medvex_checkpoints.json".to_string()
}

/// Backoff ceiling shared by embedding calls and archive downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_retry_base_delay")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_delay(),
        }
    }
}

fn default_retry_attempts() -> usize {
    5
}
fn default_retry_base_delay() -> u64 {
    500
}

impl Config {
    /// Load from MEDVEX_CONFIG if set, otherwise ./medvex.toml.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("MEDVEX_CONFIG").unwrap_or_else(|_| "medvex.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("cannot read config {}: {err}", path.display()))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.archives.start <= self.archives.end,
            "archives.start must not exceed archives.end"
        );
        anyhow::ensure!(!self.models.is_empty(), "at least one [[models]] entry is required");
        for model in &self.models {
            anyhow::ensure!(
                model.dimension > 0,
                "model {} must declare a non-zero dimension",
                model.name
            );
            anyhow::ensure!(
                matches!(model.backend.as_str(), "ollama" | "openai-compat"),
                "model {} has unknown backend {:?}",
                model.name,
                model.backend
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
