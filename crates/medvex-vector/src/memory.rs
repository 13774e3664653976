//! In-process vector store.
//!
//! Implements the same trait and schema rules as the Qdrant client, backed
//! by a map. Used by the test suite and for dry runs without a live
//! cluster.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::store::{Distance, ScoredPoint, VectorStore};

#[derive(Debug)]
struct MemCollection {
    dimension: usize,
    distance: Distance,
    points: BTreeMap<u64, (Vec<f32>, serde_json::Value)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, MemCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points currently stored in a collection.
    pub async fn point_count(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .await
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }

    /// Stored (vector, payload) for one point, if present.
    pub async fn get_point(&self, collection: &str, id: u64) -> Option<(Vec<f32>, serde_json::Value)> {
        self.inner
            .lock()
            .await
            .get(collection)
            .and_then(|c| c.points.get(&id).cloned())
    }

    /// All point ids of a collection in ascending order.
    pub async fn point_ids(&self, collection: &str) -> Vec<u64> {
        self.inner
            .lock()
            .await
            .get(collection)
            .map(|c| c.points.keys().copied().collect())
            .unwrap_or_default()
    }
}

fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match distance {
        Distance::Dot => dot,
        Distance::Cosine => {
            let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-10);
            let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-10);
            dot / (na * nb)
        }
        // Negated L2 so larger is always better, matching the sort below.
        Distance::Euclid => {
            -a.iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt()
        }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.get(collection) {
            Some(existing) if existing.dimension != dimension => Err(StoreError::SchemaConflict {
                collection: collection.to_string(),
                expected: dimension,
                actual: existing.dimension,
            }),
            Some(_) => Ok(()),
            None => {
                inner.insert(
                    collection.to_string(),
                    MemCollection {
                        dimension,
                        distance,
                        points: BTreeMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn upsert_point(
        &self,
        collection: &str,
        id: u64,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let coll = inner
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        if vector.len() != coll.dimension {
            return Err(StoreError::DimensionMismatch {
                collection: collection.to_string(),
                expected: coll.dimension,
                actual: vector.len(),
            });
        }
        coll.points.insert(id, (vector, payload));
        Ok(())
    }

    async fn query_top_k(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let inner = self.inner.lock().await;
        let coll = inner
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let mut hits: Vec<ScoredPoint> = coll
            .points
            .iter()
            .map(|(id, (v, payload))| ScoredPoint {
                id: *id,
                score: score(coll.distance, vector, v),
                payload: Some(payload.clone()),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_collection_is_idempotent() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 4, Distance::Cosine).await.unwrap();
        store.ensure_collection("c", 4, Distance::Cosine).await.unwrap();
        assert_eq!(store.point_count("c").await, 0);
    }

    #[tokio::test]
    async fn test_ensure_collection_dimension_conflict() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 4, Distance::Cosine).await.unwrap();
        let err = store.ensure_collection("c", 8, Distance::Cosine).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::SchemaConflict {
                expected: 8,
                actual: 4,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_upsert_twice_is_one_point() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        let payload = serde_json::json!({"pmid": "1"});
        store
            .upsert_point("c", 1, vec![1.0, 0.0], payload.clone())
            .await
            .unwrap();
        store
            .upsert_point("c", 1, vec![1.0, 0.0], payload.clone())
            .await
            .unwrap();
        assert_eq!(store.point_count("c").await, 1);
        let (v, p) = store.get_point("c", 1).await.unwrap();
        assert_eq!(v, vec![1.0, 0.0]);
        assert_eq!(p, payload);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        let err = store
            .upsert_point("c", 1, vec![1.0, 0.0, 0.0], serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
        assert_eq!(store.point_count("c").await, 0);
    }

    #[tokio::test]
    async fn test_query_top_k_orders_by_similarity() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        store
            .upsert_point("c", 1, vec![1.0, 0.0], serde_json::json!({"t": "east"}))
            .await
            .unwrap();
        store
            .upsert_point("c", 2, vec![0.0, 1.0], serde_json::json!({"t": "north"}))
            .await
            .unwrap();
        store
            .upsert_point("c", 3, vec![0.9, 0.1], serde_json::json!({"t": "mostly east"}))
            .await
            .unwrap();

        let hits = store.query_top_k("c", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[1].id, 3);
    }
}
