//! Error taxonomy for the ingestion pipeline.
//!
//! Containment boundaries matter more than the variants themselves:
//! `RecordParse` is recovered per record, `ChecksumMismatch`/`ArchiveCorrupt`
//! abort one archive, and `CheckpointPersist`/`SchemaConflict` (via `Store`)
//! abort the whole run.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("archive {file} corrupt: {reason}")]
    ArchiveCorrupt { file: String, reason: String },

    #[error("record parse error: {0}")]
    RecordParse(String),

    #[error("fetch failed for {file}: {reason}")]
    Fetch { file: String, reason: String },

    #[error("checkpoint persist failed: {0}")]
    CheckpointPersist(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Embed(#[from] medvex_embed::EmbedError),

    #[error(transparent)]
    Store(#[from] medvex_vector::StoreError),
}

impl IngestError {
    /// Errors that abort the enclosing archive but let the run continue
    /// with the next one.
    pub fn aborts_archive(&self) -> bool {
        matches!(
            self,
            IngestError::ChecksumMismatch { .. }
                | IngestError::ArchiveCorrupt { .. }
                | IngestError::Fetch { .. }
        )
    }
}
