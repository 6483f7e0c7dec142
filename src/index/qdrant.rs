//! Qdrant REST client.
//!
//! Talks to the collection and points endpoints of a Qdrant server:
//!
//! - `GET  /collections/{name}`                 collection metadata (404 when absent)
//! - `PUT  /collections/{name}`                 create with size / distance / hnsw_config
//! - `PUT  /collections/{name}/points?wait=true` upsert
//! - `POST /collections/{name}/points/search`   top-K search with `hnsw_ef`
//! - `POST /collections/{name}/points/count`    exact point count
//!
//! Every request carries the configured timeout. No retries.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::{
    CollectionConfig, CollectionInfo, IndexError, IndexPoint, IndexStore, PointPayload,
    ScoredPoint,
};

/// Longest engine error body carried into an error message.
const MAX_ERROR_BODY: usize = 512;

pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

/// Qdrant wraps every response body in `{"result": ..., "status": ..., "time": ...}`.
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    result: T,
}

#[derive(Serialize, Debug)]
struct WirePoint<'a> {
    id: u64,
    vector: &'a [f32],
    payload: &'a PointPayload,
}

#[derive(Deserialize, Debug)]
struct WireHit {
    id: u64,
    score: f32,
    payload: Option<PointPayload>,
}

#[derive(Deserialize, Debug)]
struct WireCount {
    count: u64,
}

impl QdrantStore {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, IndexError> {
        let base_url = base_url.strip_suffix('/').unwrap_or(base_url).to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Unreachable(format!("Failed to build http client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("{} {}", method, url);

        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Turn a non-success response into `IndexError::Engine`.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, IndexError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }

        Err(IndexError::Engine {
            status: status.as_u16(),
            message,
        })
    }

    async fn result<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, IndexError> {
        let envelope: Envelope<T> = Self::check(response).await?.json().await?;
        Ok(envelope.result)
    }
}

#[async_trait]
impl IndexStore for QdrantStore {
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    async fn collection_info(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionInfo>, IndexError> {
        let response = self
            .request(Method::GET, &format!("/collections/{}", collection))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let result: serde_json::Value = Self::result(response).await?;

        // unnamed single-vector collections only; named vectors report no size here
        let dimension = result
            .pointer("/config/params/vectors/size")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize);
        let points = result.get("points_count").and_then(|v| v.as_u64());

        Ok(Some(CollectionInfo { dimension, points }))
    }

    async fn create_collection(&self, config: &CollectionConfig) -> Result<(), IndexError> {
        let body = json!({
            "vectors": {
                "size": config.dimension,
                "distance": config.distance,
            },
            "hnsw_config": {
                "m": config.hnsw.m,
                "ef_construct": config.hnsw.ef_construct,
            },
        });

        let response = self
            .request(Method::PUT, &format!("/collections/{}", config.name))
            .json(&body)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: IndexPoint) -> Result<(), IndexError> {
        let body = json!({
            "points": [WirePoint {
                id: point.id,
                vector: &point.vector,
                payload: &point.payload,
            }],
        });

        let response = self
            .request(
                Method::PUT,
                &format!("/collections/{}/points?wait=true", collection),
            )
            .json(&body)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        hnsw_ef: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
            "params": { "hnsw_ef": hnsw_ef },
        });

        let response = self
            .request(
                Method::POST,
                &format!("/collections/{}/points/search", collection),
            )
            .json(&body)
            .send()
            .await?;

        let hits: Vec<WireHit> = Self::result(response).await?;

        hits.into_iter()
            .map(|hit| {
                let payload = hit.payload.ok_or_else(|| {
                    IndexError::MalformedResponse(format!("point {} has no payload", hit.id))
                })?;
                Ok(ScoredPoint {
                    id: hit.id,
                    score: hit.score,
                    payload,
                })
            })
            .collect()
    }

    async fn count(&self, collection: &str) -> Result<u64, IndexError> {
        let response = self
            .request(
                Method::POST,
                &format!("/collections/{}/points/count", collection),
            )
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        let count: WireCount = Self::result(response).await?;
        Ok(count.count)
    }
}
