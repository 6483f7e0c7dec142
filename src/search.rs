//! Image and text similarity search over the listing image index.
//!
//! Coordinates embedding, index queries and result shaping:
//! - image search keeps only confident matches (`score > threshold`)
//! - text search returns whatever the index ranks, unfiltered
//! - indexing upserts under an id derived from `(listing_id, image_url)`

use serde::Serialize;
use std::sync::Arc;

use crate::{
    errors::AppError,
    identity::derive_point_id,
    images,
    index::{IndexPoint, IndexStore, PointPayload, ScoredPoint},
    semantic::Embedder,
};

/// Default minimum score (exclusive) for image search results.
pub const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Default search-quality knob passed to the ANN engine.
pub const DEFAULT_SEARCH_HNSW_EF: usize = 128;

/// Result count used when a request does not specify one.
pub const DEFAULT_LIMIT: usize = 24;

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub collection: String,
    pub high_confidence_threshold: f32,
    pub hnsw_ef: usize,
    /// Larger requested limits are clamped to this
    pub max_limit: usize,
}

/// One search hit as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub score: f32,
    pub listing_id: String,
    pub image_url: String,
}

impl From<ScoredPoint> for SearchResult {
    fn from(point: ScoredPoint) -> Self {
        Self {
            score: point.score,
            listing_id: point.payload.listing_id,
            image_url: point.payload.image_url,
        }
    }
}

pub struct SearchService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    settings: SearchSettings,
}

impl SearchService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn IndexStore>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            settings,
        }
    }

    /// Find indexed images similar to the uploaded one.
    ///
    /// Only results scoring above the high-confidence threshold are kept,
    /// in the order the index returned them.
    pub async fn search_by_image(
        &self,
        image_bytes: &[u8],
        limit: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        let limit = self.check_limit(limit)?;
        let embedding = self.embed_image(image_bytes)?;

        let hits = self.query(&embedding, limit).await?;
        let total = hits.len();

        let threshold = self.settings.high_confidence_threshold;
        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| hit.score > threshold)
            .map(SearchResult::from)
            .collect();

        log::debug!(
            "image search: {} of {} hits above {}",
            results.len(),
            total,
            threshold
        );

        Ok(results)
    }

    /// Find indexed images matching a text query. No score floor.
    pub async fn search_by_text(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("query text is empty".to_string()));
        }
        let limit = self.check_limit(limit)?;

        let embedding =
            tokio::task::block_in_place(|| self.embedder.embed_text(query))?;

        let hits = self.query(&embedding, limit).await?;
        log::debug!("text search '{}': {} hits", query, hits.len());

        Ok(hits.into_iter().map(SearchResult::from).collect())
    }

    /// Embed an image and upsert it under its derived point id.
    ///
    /// Returns the point id. Indexing the same pair again overwrites.
    pub async fn index_image(
        &self,
        listing_id: &str,
        image_url: &str,
        image_bytes: &[u8],
    ) -> Result<u64, AppError> {
        if listing_id.trim().is_empty() {
            return Err(AppError::InvalidInput("listing_id is required".to_string()));
        }
        if image_url.trim().is_empty() {
            return Err(AppError::InvalidInput("image_url is required".to_string()));
        }

        let vector = self.embed_image(image_bytes)?;
        let id = derive_point_id(listing_id, image_url);

        self.store
            .upsert(
                &self.settings.collection,
                IndexPoint {
                    id,
                    vector,
                    payload: PointPayload {
                        listing_id: listing_id.to_string(),
                        image_url: image_url.to_string(),
                    },
                },
            )
            .await?;

        log::info!("indexed listing {} image {} as point {}", listing_id, image_url, id);

        Ok(id)
    }

    fn embed_image(&self, image_bytes: &[u8]) -> Result<Vec<f32>, AppError> {
        tokio::task::block_in_place(|| {
            let img = images::decode_image(image_bytes)?;
            self.embedder.embed_image(&img).map_err(AppError::from)
        })
    }

    async fn query(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredPoint>, AppError> {
        let hits = self
            .store
            .search(
                &self.settings.collection,
                embedding,
                limit,
                self.settings.hnsw_ef,
            )
            .await?;
        Ok(hits)
    }

    fn check_limit(&self, limit: usize) -> Result<usize, AppError> {
        if limit == 0 {
            return Err(AppError::InvalidInput("limit must be positive".to_string()));
        }
        Ok(limit.min(self.settings.max_limit))
    }
}
