//! The vector store capability seam.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Distance metric for a collection. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
        }
    }
}

impl FromStr for Distance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Distance::Cosine),
            "dot" => Ok(Distance::Dot),
            "euclid" | "euclidean" => Ok(Distance::Euclid),
            other => Err(format!("unknown distance metric: {other}")),
        }
    }
}

/// One similarity hit from `query_top_k`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    pub payload: Option<serde_json::Value>,
}

/// Collection/point operations the pipeline relies on. Both operations the
/// writer uses are idempotent: `ensure_collection` is create-if-absent and
/// `upsert_point` overwrites by id, which is what makes replaying an
/// in-flight article after a crash safe.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent. Must be safe under concurrent first
    /// use. An existing collection with a different dimension is a
    /// `SchemaConflict`, never migrated.
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()>;

    /// Insert or overwrite the point keyed by `id`.
    async fn upsert_point(
        &self,
        collection: &str,
        id: u64,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) -> Result<()>;

    /// Top-k similarity search. Consumed by downstream search front ends.
    async fn query_top_k(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredPoint>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_round_trip() {
        assert_eq!("cosine".parse::<Distance>().unwrap(), Distance::Cosine);
        assert_eq!("Euclidean".parse::<Distance>().unwrap(), Distance::Euclid);
        assert!("manhattan".parse::<Distance>().is_err());
        assert_eq!(Distance::Dot.as_str(), "Dot");
    }
}
