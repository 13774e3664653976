//! Error types for embedding backends.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedError>;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend rate limited")]
    RateLimited,

    #[error("model {model} returned a {actual}-dim vector, expected {expected}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl EmbedError {
    /// Whether a retry with backoff can possibly succeed.
    /// Dimension and decode failures are deterministic and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbedError::Unavailable(_) | EmbedError::RateLimited)
    }
}

/// Map a transport failure onto the taxonomy. Connection, timeout and body
/// errors all mean the backend cannot currently answer; a decode failure is
/// a malformed response and retrying it is pointless.
pub(crate) fn classify_transport(err: reqwest::Error) -> EmbedError {
    if err.is_decode() {
        EmbedError::Malformed(err.to_string())
    } else {
        EmbedError::Unavailable(err.to_string())
    }
}

/// Map an HTTP status onto the taxonomy. 429 is an explicit rate-limit
/// signal, 5xx means the backend is down; anything else is a hard failure.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: String) -> EmbedError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        EmbedError::RateLimited
    } else if status.is_server_error() {
        EmbedError::Unavailable(format!("HTTP {status}: {body}"))
    } else {
        EmbedError::Malformed(format!("HTTP {status}: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EmbedError::Unavailable("down".into()).is_retryable());
        assert!(EmbedError::RateLimited.is_retryable());
        assert!(!EmbedError::DimensionMismatch {
            model: "bge-m3".into(),
            expected: 1024,
            actual: 768,
        }
        .is_retryable());
        assert!(!EmbedError::Malformed("bad".into()).is_retryable());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new()),
            EmbedError::RateLimited
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::BAD_GATEWAY, String::new()),
            EmbedError::Unavailable(_)
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::BAD_REQUEST, String::new()),
            EmbedError::Malformed(_)
        ));
    }
}
