//! Qdrant REST client.
//!
//! Speaks the collection/point HTTP API directly:
//!   PUT  /collections/{name}                  create (idempotent bootstrap)
//!   GET  /collections/{name}                  schema inspection
//!   PUT  /collections/{name}/points?wait=true upsert
//!   POST /collections/{name}/points/search    top-k query

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::{Distance, ScoredPoint, VectorStore};

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
}

impl QdrantStore {
    /// `api_key`, when present, is sent as the `api-key` header on every
    /// request.
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key.trim())
                .map_err(|_| StoreError::Api {
                    status: 0,
                    message: "API key is not a valid header value".to_string(),
                })?;
            headers.insert("api-key", value);
        }
        let client = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }

    /// Read the live vector dimension of an existing collection.
    async fn live_dimension(&self, collection: &str) -> Result<usize> {
        let resp = self.client.get(self.collection_url(collection)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        let info: CollectionInfoResponse = api_json(resp).await?;
        Ok(info.result.config.params.vectors.size)
    }
}

/// Decode a Qdrant envelope, mapping non-success statuses onto `Api`.
async fn api_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(StoreError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp.json().await?)
}

#[derive(Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Deserialize)]
struct VectorParams {
    size: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    id: u64,
    score: f32,
    payload: Option<serde_json::Value>,
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        // Create first, inspect on conflict: safe under concurrent first
        // use, unlike a check-then-create sequence.
        let body = serde_json::json!({
            "vectors": { "size": dimension, "distance": distance.as_str() }
        });
        let resp = self
            .client
            .put(self.collection_url(collection))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            info!(collection, dimension, distance = distance.as_str(), "collection created");
            return Ok(());
        }
        if status == StatusCode::CONFLICT || status == StatusCode::BAD_REQUEST {
            let live = self.live_dimension(collection).await?;
            if live != dimension {
                return Err(StoreError::SchemaConflict {
                    collection: collection.to_string(),
                    expected: dimension,
                    actual: live,
                });
            }
            debug!(collection, dimension, "collection already exists");
            return Ok(());
        }
        let message = resp.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn upsert_point(
        &self,
        collection: &str,
        id: u64,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) -> Result<()> {
        let url = format!("{}/points?wait=true", self.collection_url(collection));
        let body = serde_json::json!({
            "points": [{ "id": id, "vector": vector, "payload": payload }]
        });
        let resp = self.client.put(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        debug!(collection, id, "point upserted");
        Ok(())
    }

    async fn query_top_k(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let url = format!("{}/points/search", self.collection_url(collection));
        let body = serde_json::json!({
            "vector": vector,
            "limit": k,
            "with_payload": true
        });
        let resp = self.client.post(&url).json(&body).send().await?;
        let parsed: SearchResponse = api_json(resp).await?;
        Ok(parsed
            .result
            .into_iter()
            .map(|hit| ScoredPoint {
                id: hit.id,
                score: hit.score,
                payload: hit.payload,
            })
            .collect())
    }
}
