//! Archive acquisition.
//!
//! Baseline files are addressed by sequence number; every archive has a
//! published digest sidecar at the same address plus `.md5`. The source is
//! a byte-stream seam: production streams over HTTPS, tests feed fixture
//! bytes through the same trait.

use async_trait::async_trait;
use futures_util::StreamExt;
use tempfile::{NamedTempFile, TempPath};
use tracing::{info, warn};

use medvex_embed::RetryPolicy;

use crate::error::{IngestError, Result};

pub const DEFAULT_BASE_URL: &str = "https://ftp.ncbi.nlm.nih.gov/pubmed/baseline";
pub const DEFAULT_FILE_PREFIX: &str = "pubmed25n";

/// A downloaded archive, not yet verified. The temp file is deleted when
/// this value drops.
pub struct FetchedArchive {
    pub seq: u32,
    pub file_name: String,
    pub path: TempPath,
    pub byte_len: u64,
}

#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Archive file name for a sequence number, e.g. `pubmed25n0001.xml.gz`.
    fn file_name(&self, seq: u32) -> String;

    /// Stream the archive body to local disk. Memory use is bounded by one
    /// transfer chunk, not the archive size.
    async fn fetch_archive(&self, seq: u32) -> Result<FetchedArchive>;

    /// The published reference digest for this archive.
    async fn expected_digest(&self, seq: u32) -> Result<String>;
}

enum DownloadError {
    /// Worth retrying: transport failures and server errors.
    Transient(String),
    /// Not worth retrying: 4xx, local IO.
    Permanent(String),
}

impl DownloadError {
    fn message(&self) -> &str {
        match self {
            DownloadError::Transient(m) | DownloadError::Permanent(m) => m,
        }
    }
}

pub struct HttpBaselineSource {
    client: reqwest::Client,
    base_url: String,
    file_prefix: String,
    retry: RetryPolicy,
}

impl HttpBaselineSource {
    pub fn new(base_url: &str, file_prefix: &str, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            file_prefix: file_prefix.to_string(),
            retry,
        }
    }

    async fn download_to_temp(&self, url: &str) -> std::result::Result<(TempPath, u64), DownloadError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| DownloadError::Transient(err.to_string()))?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(DownloadError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(DownloadError::Permanent(format!("HTTP {status}")));
        }

        let mut file =
            NamedTempFile::new().map_err(|err| DownloadError::Permanent(err.to_string()))?;
        let mut stream = resp.bytes_stream();
        let mut byte_len = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| DownloadError::Transient(err.to_string()))?;
            byte_len += chunk.len() as u64;
            std::io::Write::write_all(&mut file, &chunk)
                .map_err(|err| DownloadError::Permanent(err.to_string()))?;
        }
        Ok((file.into_temp_path(), byte_len))
    }

    async fn download_with_retry(
        &self,
        file_name: &str,
        url: &str,
    ) -> Result<(TempPath, u64)> {
        let mut attempt = 0usize;
        loop {
            match self.download_to_temp(url).await {
                Ok(ok) => return Ok(ok),
                Err(DownloadError::Transient(reason))
                    if attempt + 1 < self.retry.max_attempts =>
                {
                    attempt += 1;
                    let delay = self.retry.backoff_delay(attempt);
                    warn!(
                        file = file_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "download failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(IngestError::Fetch {
                        file: file_name.to_string(),
                        reason: err.message().to_string(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl ArchiveSource for HttpBaselineSource {
    fn file_name(&self, seq: u32) -> String {
        format!("{}{:04}.xml.gz", self.file_prefix, seq)
    }

    async fn fetch_archive(&self, seq: u32) -> Result<FetchedArchive> {
        let file_name = self.file_name(seq);
        let url = format!("{}/{}", self.base_url, file_name);
        let (path, byte_len) = self.download_with_retry(&file_name, &url).await?;
        info!(file = %file_name, byte_len, "archive downloaded");
        Ok(FetchedArchive {
            seq,
            file_name,
            path,
            byte_len,
        })
    }

    async fn expected_digest(&self, seq: u32) -> Result<String> {
        let file_name = self.file_name(seq);
        let sidecar = format!("{file_name}.md5");
        let url = format!("{}/{}", self.base_url, sidecar);
        let (path, _) = self.download_with_retry(&sidecar, &url).await?;
        let contents = tokio::fs::read_to_string(&path).await?;
        parse_digest_sidecar(&contents).ok_or_else(|| IngestError::Fetch {
            file: sidecar,
            reason: "digest sidecar is empty".to_string(),
        })
    }
}

/// Parse a digest sidecar. NCBI publishes `MD5(name)= hex`; some mirrors
/// serve `hex  name`. Either way the hex is what matters.
pub fn parse_digest_sidecar(contents: &str) -> Option<String> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some((_, hex)) = trimmed.split_once('=') {
        let hex = hex.trim();
        (!hex.is_empty()).then(|| hex.to_string())
    } else {
        trimmed.split_whitespace().next().map(|s| s.to_string())
    }
}
