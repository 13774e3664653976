//! End-to-end ingestion pipeline.
//!
//! Drives, for each archive in the configured range:
//!   1. Fetch the archive and its published digest
//!   2. Verify integrity (no extraction on mismatch)
//!   3. Stream-extract records, skipping past checkpointed work
//!   4. Filter and normalize each record
//!   5. Embed + upsert + checkpoint per model lane, lanes independent
//!
//! Per archive the traversal is a single sequence, but the per-model
//! embed/write/checkpoint lanes run concurrently and fail independently:
//! a lane that exhausts its retry ceiling is stalled for the rest of the
//! archive while the others keep advancing. Restart is the only recovery
//! mechanism — a new run re-derives every lane's resume point from the
//! checkpoint store, and idempotent upserts absorb the replay of the one
//! article that may have been in flight.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use medvex_embed::{embed_with_retry, EmbeddingProvider, RetryPolicy};
use medvex_vector::{Distance, StoreError, VectorStore};

use crate::checkpoint::CheckpointStore;
use crate::error::{IngestError, Result};
use crate::extract::RecordReader;
use crate::fetch::ArchiveSource;
use crate::filter::{self, ExclusionReason, FilterOutcome};
use crate::models::ArticleRecord;
use crate::verify::verify_archive;

// ── Run config ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Inclusive archive sequence range.
    pub archive_start: u32,
    pub archive_end: u32,
    /// Per-archive cap, counted over filter-passed articles.
    pub max_articles: usize,
    /// Language code an article must carry to be embedded.
    pub target_language: String,
    /// Collections are named `{prefix}_{model}`.
    pub collection_prefix: String,
    pub distance: Distance,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            archive_start: 1,
            archive_end: 1,
            max_articles: 10_000,
            target_language: "eng".to_string(),
            collection_prefix: "pubmed".to_string(),
            distance: Distance::Cosine,
            retry: RetryPolicy::default(),
        }
    }
}

/// Collection name for a model under the configured naming scheme.
pub fn collection_name(prefix: &str, model: &str) -> String {
    let sanitized: String = model
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{prefix}_{sanitized}")
}

// ── Archive state machine ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveState {
    Fetching,
    Verifying,
    Parsing,
    Processing,
    Completed,
    Aborted,
}

impl ArchiveState {
    fn as_str(&self) -> &'static str {
        match self {
            ArchiveState::Fetching => "fetching",
            ArchiveState::Verifying => "verifying",
            ArchiveState::Parsing => "parsing",
            ArchiveState::Processing => "processing",
            ArchiveState::Completed => "completed",
            ArchiveState::Aborted => "aborted",
        }
    }
}

fn transition(seq: u32, state: ArchiveState) {
    info!(seq, state = state.as_str(), "archive state");
}

// ── Reports ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveStatus {
    Completed,
    Aborted { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct LaneReport {
    pub model: String,
    pub collection: String,
    pub written: usize,
    pub skipped: usize,
    pub stalled: bool,
    pub checkpoint: Option<u64>,
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub seq: u32,
    pub file_name: String,
    pub status: ArchiveStatus,
    /// Records handed to the filter this run (post resume skip).
    pub records_seen: usize,
    /// Records consumed by the extractor-level resume skip.
    pub resume_skipped: usize,
    pub parse_errors: usize,
    pub excluded_retracted: usize,
    pub excluded_no_abstract: usize,
    pub excluded_language: usize,
    pub included: usize,
    pub lanes: Vec<LaneReport>,
}

impl ArchiveReport {
    fn new(seq: u32, file_name: String) -> Self {
        Self {
            seq,
            file_name,
            status: ArchiveStatus::Completed,
            records_seen: 0,
            resume_skipped: 0,
            parse_errors: 0,
            excluded_retracted: 0,
            excluded_no_abstract: 0,
            excluded_language: 0,
            included: 0,
            lanes: Vec::new(),
        }
    }

    fn aborted(mut self, err: &IngestError) -> Self {
        error!(seq = self.seq, error = %err, "archive aborted");
        transition(self.seq, ArchiveState::Aborted);
        self.status = ArchiveStatus::Aborted {
            reason: err.to_string(),
        };
        self
    }

    fn count_exclusion(&mut self, reason: ExclusionReason) {
        match reason {
            ExclusionReason::Retracted => self.excluded_retracted += 1,
            ExclusionReason::MissingAbstract => self.excluded_no_abstract += 1,
            ExclusionReason::LanguageMismatch => self.excluded_language += 1,
        }
    }

    fn with_lanes(mut self, lanes: &[ModelLane]) -> Self {
        self.lanes = lanes.iter().map(ModelLane::report).collect();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub archives: Vec<ArchiveReport>,
}

impl RunSummary {
    pub fn points_written(&self) -> usize {
        self.archives
            .iter()
            .flat_map(|a| a.lanes.iter())
            .map(|l| l.written)
            .sum()
    }
}

// ── Model lanes ───────────────────────────────────────────────────────────────

/// One model's independent embed → write → checkpoint track through an
/// archive. The only cross-lane state is the checkpoint store and the
/// collection metadata, both partitioned by model.
struct ModelLane {
    provider: Arc<dyn EmbeddingProvider>,
    collection: String,
    checkpoint: Option<u64>,
    stalled: bool,
    written: usize,
    skipped: usize,
    failures: Vec<String>,
}

impl ModelLane {
    /// Handle one included article. `Err` is reserved for failures that
    /// must end the whole run (schema conflict, checkpoint persistence);
    /// everything else stalls this lane and lets the others continue.
    async fn process(
        &mut self,
        seq: u32,
        article: &ArticleRecord,
        store: &dyn VectorStore,
        checkpoints: &CheckpointStore,
        retry: &RetryPolicy,
    ) -> Result<()> {
        if self.stalled {
            return Ok(());
        }
        if self.checkpoint.is_some_and(|cp| article.pmid <= cp) {
            self.skipped += 1;
            return Ok(());
        }

        let vector = match embed_with_retry(self.provider.as_ref(), &article.abstract_text, retry)
            .await
        {
            Ok(v) => v,
            Err(err) => {
                self.stall(seq, article.pmid, &err.to_string());
                return Ok(());
            }
        };

        match store
            .upsert_point(
                &self.collection,
                article.pmid,
                vector,
                article.payload.clone(),
            )
            .await
        {
            Ok(()) => {}
            Err(err @ StoreError::SchemaConflict { .. }) => return Err(err.into()),
            Err(err) => {
                self.stall(seq, article.pmid, &err.to_string());
                return Ok(());
            }
        }

        // Durable before the lane advances; on failure the run must stop
        // rather than risk skipping this article on resume.
        checkpoints
            .record_progress(seq, self.provider.model_name(), article.pmid)
            .await?;
        self.checkpoint = Some(article.pmid);
        self.written += 1;
        debug!(seq, pmid = article.pmid, model = self.provider.model_name(), "article persisted");
        Ok(())
    }

    fn stall(&mut self, seq: u32, pmid: u64, reason: &str) {
        warn!(
            seq,
            pmid,
            model = self.provider.model_name(),
            reason,
            "lane stalled; checkpoint held at last success"
        );
        self.failures.push(format!("pmid {pmid}: {reason}"));
        self.stalled = true;
    }

    fn report(&self) -> LaneReport {
        LaneReport {
            model: self.provider.model_name().to_string(),
            collection: self.collection.clone(),
            written: self.written,
            skipped: self.skipped,
            stalled: self.stalled,
            checkpoint: self.checkpoint,
            failures: self.failures.clone(),
        }
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Run the pipeline over the configured archive range. Aborted archives
/// are recorded in the summary and do not stop the run; schema conflicts
/// and checkpoint persistence failures do.
#[instrument(skip_all, fields(start = cfg.archive_start, end = cfg.archive_end))]
pub async fn run_pipeline(
    cfg: &PipelineConfig,
    source: &dyn ArchiveSource,
    providers: &[Arc<dyn EmbeddingProvider>],
    store: &dyn VectorStore,
    checkpoints: &CheckpointStore,
) -> Result<RunSummary> {
    let job_id = Uuid::new_v4();
    let started_at = Utc::now();
    let t0 = Instant::now();
    info!(job_id = %job_id, models = providers.len(), "starting ingestion run");

    checkpoints.load().await?;

    let mut archives = Vec::new();
    for seq in cfg.archive_start..=cfg.archive_end {
        let report = run_archive(seq, cfg, source, providers, store, checkpoints).await?;
        archives.push(report);
    }

    let summary = RunSummary {
        job_id,
        started_at,
        duration_ms: t0.elapsed().as_millis() as u64,
        archives,
    };
    info!(
        job_id = %job_id,
        archives = summary.archives.len(),
        points_written = summary.points_written(),
        duration_ms = summary.duration_ms,
        "ingestion run complete"
    );
    Ok(summary)
}

#[instrument(skip_all, fields(seq = seq))]
async fn run_archive(
    seq: u32,
    cfg: &PipelineConfig,
    source: &dyn ArchiveSource,
    providers: &[Arc<dyn EmbeddingProvider>],
    store: &dyn VectorStore,
    checkpoints: &CheckpointStore,
) -> Result<ArchiveReport> {
    let report = ArchiveReport::new(seq, source.file_name(seq));

    // ── Fetch ─────────────────────────────────────────────────────────────
    transition(seq, ArchiveState::Fetching);
    let archive = match source.fetch_archive(seq).await {
        Ok(a) => a,
        Err(err) => return Ok(report.aborted(&err)),
    };
    let expected = match source.expected_digest(seq).await {
        Ok(d) => d,
        Err(err) => return Ok(report.aborted(&err)),
    };

    // ── Verify ────────────────────────────────────────────────────────────
    transition(seq, ArchiveState::Verifying);
    if let Err(err) = verify_archive(&archive.path, &archive.file_name, &expected).await {
        return Ok(report.aborted(&err));
    }

    // ── Parse setup ───────────────────────────────────────────────────────
    transition(seq, ArchiveState::Parsing);
    let mut reader = match RecordReader::open_gzip(&archive.path, &archive.file_name) {
        Ok(r) => r,
        Err(err) => return Ok(report.aborted(&err)),
    };

    let mut lanes = Vec::with_capacity(providers.len());
    for provider in providers {
        let collection = collection_name(&cfg.collection_prefix, provider.model_name());
        store
            .ensure_collection(&collection, provider.dimension(), cfg.distance)
            .await?;
        let checkpoint = checkpoints.resume_point(seq, provider.model_name()).await;
        lanes.push(ModelLane {
            provider: Arc::clone(provider),
            collection,
            checkpoint,
            stalled: false,
            written: 0,
            skipped: 0,
            failures: Vec::new(),
        });
    }

    let mut report = report;

    // Extractor-level resume: only safe up to the slowest lane; faster
    // lanes skip the remainder record by record.
    if let Some(resume) = lanes.iter().map(|l| l.checkpoint).min().flatten() {
        match reader.skip_to(resume) {
            Ok(skipped) => {
                report.resume_skipped = skipped;
                if skipped > 0 {
                    info!(seq, resume, skipped, "resumed past checkpointed records");
                }
            }
            Err(err) if err.aborts_archive() => return Ok(report.with_lanes(&lanes).aborted(&err)),
            Err(err) => return Err(err),
        }
    }

    // ── Process ───────────────────────────────────────────────────────────
    transition(seq, ArchiveState::Processing);
    while report.included < cfg.max_articles {
        match reader.next_record() {
            None => break,
            Some(Err(IngestError::RecordParse(msg))) => {
                warn!(seq, error = %msg, "skipping malformed record");
                report.parse_errors += 1;
            }
            Some(Err(err)) if err.aborts_archive() => {
                return Ok(report.with_lanes(&lanes).aborted(&err));
            }
            Some(Err(err)) => return Err(err),
            Some(Ok(raw)) => {
                report.records_seen += 1;
                let pmid = raw.pmid;
                match filter::apply(raw, &cfg.target_language) {
                    FilterOutcome::Excluded { reason, .. } => {
                        debug!(seq, pmid, reason = reason.as_str(), "record excluded");
                        report.count_exclusion(reason);
                    }
                    FilterOutcome::Included(article) => {
                        report.included += 1;
                        let results = join_all(lanes.iter_mut().map(|lane| {
                            lane.process(seq, &article, store, checkpoints, &cfg.retry)
                        }))
                        .await;
                        for result in results {
                            result?;
                        }
                        if !lanes.is_empty() && lanes.iter().all(|l| l.stalled) {
                            warn!(seq, "every lane stalled, leaving the rest of the archive to a later run");
                            break;
                        }
                    }
                }
            }
        }
    }

    transition(seq, ArchiveState::Completed);
    Ok(report.with_lanes(&lanes))
}
