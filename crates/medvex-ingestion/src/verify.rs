//! Archive integrity verification.
//!
//! The digest is computed over the downloaded bytes in fixed-size chunks;
//! the whole archive is never held in memory. On mismatch the archive is
//! not handed to the extractor — no partial processing happens.

use std::path::Path;

use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use crate::error::{IngestError, Result};

const CHUNK_SIZE: usize = 64 * 1024;

/// Compare the archive's content digest with the published reference
/// value (hex, case-insensitive).
pub async fn verify_archive(path: &Path, file_name: &str, expected: &str) -> Result<()> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let actual = format!("{:x}", hasher.finalize());
    let expected = expected.trim();

    if actual.eq_ignore_ascii_case(expected) {
        info!(file = file_name, digest = %actual, "checksum verified");
        Ok(())
    } else {
        error!(file = file_name, expected, actual = %actual, "checksum mismatch");
        Err(IngestError::ChecksumMismatch {
            file: file_name.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}
