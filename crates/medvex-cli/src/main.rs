//! Medvex command line.
//!
//! Run with: cargo run -p medvex-cli
//!
//! Loads medvex.toml (or MEDVEX_CONFIG), builds the configured embedding
//! providers and the Qdrant client, and runs the ingestion pipeline over
//! the configured archive range. Interrupt at any point; the next run
//! resumes from the checkpoint file.

mod config;

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use medvex_embed::{build_provider, EmbedBackend, EmbedderConfig, EmbeddingProvider, RetryPolicy};
use medvex_ingestion::{run_pipeline, CheckpointStore, HttpBaselineSource, PipelineConfig};
use medvex_vector::{Distance, QdrantStore};

use config::{Config, ModelConfig};

fn env_secret(var: &Option<String>) -> Option<String> {
    var.as_deref().and_then(|name| std::env::var(name).ok())
}

fn provider_from_config(model: &ModelConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let backend = match model.backend.as_str() {
        "ollama" => EmbedBackend::Ollama,
        "openai-compat" => EmbedBackend::OpenAiCompat,
        other => anyhow::bail!("unknown embedding backend: {other}"),
    };
    Ok(build_provider(EmbedderConfig {
        backend,
        model: model.name.clone(),
        dim: model.dimension,
        base_url: model.base_url.clone(),
        api_key: env_secret(&model.api_key_env),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::load()?;
    info!(
        start = config.archives.start,
        end = config.archives.end,
        models = config.models.len(),
        "Medvex starting"
    );

    let retry = RetryPolicy {
        max_attempts: config.retry.max_attempts,
        base_delay_ms: config.retry.base_delay_ms,
    };

    let providers = config
        .models
        .iter()
        .map(provider_from_config)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let store = QdrantStore::new(&config.qdrant.url, env_secret(&config.qdrant.api_key_env).as_deref())?;
    let checkpoints = CheckpointStore::new(&config.checkpoint.path);
    let source = HttpBaselineSource::new(
        &config.archives.base_url,
        &config.archives.file_prefix,
        retry.clone(),
    );

    let pipeline_config = PipelineConfig {
        archive_start: config.archives.start,
        archive_end: config.archives.end,
        max_articles: config.archives.max_articles,
        target_language: config.filter.language.clone(),
        collection_prefix: config.qdrant.collection_prefix.clone(),
        distance: Distance::from_str(&config.qdrant.distance)
            .map_err(|err| anyhow::anyhow!(err))?,
        retry,
    };

    let summary = run_pipeline(&pipeline_config, &source, &providers, &store, &checkpoints).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
