//! medvex-embed — Embedding backend clients.
//!
//! Turns abstract text into fixed-dimension vectors under a named model.
//! Backends are opaque network services behind [`EmbeddingProvider`]:
//!   - Ollama            (`/api/embeddings` — bge-m3, bge-large, …)
//!   - OpenAI-compatible (any `/v1/embeddings` endpoint)
//!
//! Transient failures (`Unavailable`, `RateLimited`) are retried with
//! bounded exponential backoff; a vector of the wrong length is a hard
//! `DimensionMismatch` and is never returned to callers.

pub mod config;
pub mod error;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod retry;

pub use config::{EmbedBackend, EmbedderConfig};
pub use error::{EmbedError, Result};
pub use provider::{build_provider, EmbeddingProvider};
pub use retry::{embed_with_retry, RetryPolicy};
