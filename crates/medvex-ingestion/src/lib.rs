//! medvex-ingestion — Resumable baseline ingestion pipeline.
//!
//! Integrity-checked archive acquisition, streaming record extraction,
//! filtering, multi-model embedding, and idempotent vector persistence,
//! with durable per-(archive, model) checkpoints so an interrupted run
//! resumes exactly where it left off.

pub mod checkpoint;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod verify;

pub use checkpoint::CheckpointStore;
pub use error::{IngestError, Result};
pub use fetch::{ArchiveSource, FetchedArchive, HttpBaselineSource};
pub use pipeline::{run_pipeline, PipelineConfig, RunSummary};
