//! Durable per-(archive, model) progress tracking.
//!
//! One JSON map on disk, keyed `"{seq:04}/{model}"`, value = last PMID
//! fully persisted for that lane. `record_progress` replaces the file
//! atomically (write temp, rename) and must succeed before a lane moves
//! past an article — that ordering is what makes resume-after-crash safe:
//! at most the single in-flight article is replayed, and replays are
//! absorbed by the idempotent vector writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{IngestError, Result};

#[derive(Clone, Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: Arc<Mutex<BTreeMap<String, u64>>>,
}

fn lane_key(seq: u32, model: &str) -> String {
    format!("{seq:04}/{model}")
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load previously persisted progress, if any. A missing file is a
    /// fresh start; an unreadable one is fatal rather than silently
    /// restarting every lane from zero.
    pub async fn load(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let data = fs::read_to_string(&self.path).await?;
        let entries: BTreeMap<String, u64> = serde_json::from_str(&data)
            .map_err(|err| IngestError::CheckpointPersist(format!("corrupt checkpoint file: {err}")))?;
        let mut guard = self.state.lock().await;
        *guard = entries;
        debug!(path = %self.path.display(), lanes = guard.len(), "checkpoints loaded");
        Ok(())
    }

    /// Last PMID fully persisted for this lane, if the lane has run before.
    pub async fn resume_point(&self, seq: u32, model: &str) -> Option<u64> {
        self.state.lock().await.get(&lane_key(seq, model)).copied()
    }

    /// Durably record that `pmid` is fully persisted for this lane.
    /// Regressions are ignored (a lane never moves backwards); replaying
    /// the current checkpoint is a no-op.
    pub async fn record_progress(&self, seq: u32, model: &str, pmid: u64) -> Result<()> {
        let key = lane_key(seq, model);
        let mut guard = self.state.lock().await;
        match guard.get(&key) {
            Some(&existing) if existing > pmid => {
                warn!(lane = %key, existing, pmid, "ignoring checkpoint regression");
                return Ok(());
            }
            Some(&existing) if existing == pmid => return Ok(()),
            _ => {}
        }
        guard.insert(key, pmid);
        let serialized = serde_json::to_string_pretty(&*guard)
            .map_err(|err| IngestError::CheckpointPersist(err.to_string()))?;
        drop(guard);
        self.persist(&serialized).await
    }

    async fn persist(&self, serialized: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|err| IngestError::CheckpointPersist(err.to_string()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized)
            .await
            .map_err(|err| IngestError::CheckpointPersist(err.to_string()))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| IngestError::CheckpointPersist(err.to_string()))?;
        Ok(())
    }
}
