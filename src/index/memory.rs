//! In-memory vector index with cosine similarity search.
//!
//! Exact brute-force search; meant for local development (`INDEX_BACKEND=memory`)
//! and tests. Nothing is persisted.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{
    CollectionConfig, CollectionInfo, IndexError, IndexPoint, IndexStore, PointPayload,
    ScoredPoint,
};
use crate::semantic::vector;

/// An entry in a collection.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub embedding: Vec<f32>,
    pub payload: PointPayload,
}

struct Collection {
    dimensions: usize,
    /// Point ID -> entry
    entries: HashMap<u64, VectorEntry>,
}

/// In-memory index holding any number of named collections.
#[derive(Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of an entry by point ID.
    #[cfg(test)]
    pub fn get(&self, collection: &str, id: u64) -> Option<VectorEntry> {
        let collections = self.collections.read().ok()?;
        collections.get(collection)?.entries.get(&id).cloned()
    }

    /// Number of entries in `collection`, 0 when it does not exist.
    #[cfg(test)]
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .ok()
            .and_then(|c| c.get(collection).map(|c| c.entries.len()))
            .unwrap_or(0)
    }

    fn lock_poisoned<E: std::fmt::Display>(e: E) -> IndexError {
        IndexError::Unreachable(format!("Lock poisoned: {}", e))
    }
}

#[async_trait]
impl IndexStore for MemoryIndex {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn collection_info(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionInfo>, IndexError> {
        let collections = self.collections.read().map_err(Self::lock_poisoned)?;
        Ok(collections.get(collection).map(|c| CollectionInfo {
            dimension: Some(c.dimensions),
            points: Some(c.entries.len() as u64),
        }))
    }

    async fn create_collection(&self, config: &CollectionConfig) -> Result<(), IndexError> {
        let mut collections = self.collections.write().map_err(Self::lock_poisoned)?;
        collections
            .entry(config.name.clone())
            .or_insert_with(|| Collection {
                dimensions: config.dimension,
                entries: HashMap::new(),
            });
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: IndexPoint) -> Result<(), IndexError> {
        let mut collections = self.collections.write().map_err(Self::lock_poisoned)?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

        if point.vector.len() != target.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: target.dimensions,
                got: point.vector.len(),
            });
        }

        if vector::l2_norm(&point.vector) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        target.entries.insert(
            point.id,
            VectorEntry {
                embedding: point.vector,
                payload: point.payload,
            },
        );

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        _hnsw_ef: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        let collections = self.collections.read().map_err(Self::lock_poisoned)?;
        let target = collections
            .get(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

        if query.len() != target.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: target.dimensions,
                got: query.len(),
            });
        }

        if vector::l2_norm(query) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let mut results: Vec<ScoredPoint> = target
            .entries
            .iter()
            .map(|(id, entry)| ScoredPoint {
                id: *id,
                score: vector::cosine_similarity(query, &entry.embedding),
                payload: entry.payload.clone(),
            })
            .collect();

        // Sort by score descending
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        results.truncate(limit);

        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<u64, IndexError> {
        let collections = self.collections.read().map_err(Self::lock_poisoned)?;
        collections
            .get(collection)
            .map(|c| c.entries.len() as u64)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Distance, HnswTuning};

    const COLLECTION: &str = "test";

    fn point(id: u64, listing: &str, vector: Vec<f32>) -> IndexPoint {
        IndexPoint {
            id,
            vector,
            payload: PointPayload {
                listing_id: listing.to_string(),
                image_url: format!("http://x/{listing}.jpg"),
            },
        }
    }

    async fn index_with_dims(dimension: usize) -> MemoryIndex {
        let index = MemoryIndex::new();
        index
            .create_collection(&CollectionConfig {
                name: COLLECTION.to_string(),
                dimension,
                distance: Distance::Cosine,
                hnsw: HnswTuning::default(),
            })
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let index = MemoryIndex::new();
        assert!(index.collection_info(COLLECTION).await.unwrap().is_none());

        let result = index.upsert(COLLECTION, point(1, "a", vec![1.0])).await;
        assert!(matches!(result, Err(IndexError::CollectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let index = index_with_dims(3).await;
        index.upsert(COLLECTION, point(1, "a", vec![1.0, 0.0, 0.0])).await.unwrap();

        index
            .create_collection(&CollectionConfig {
                name: COLLECTION.to_string(),
                dimension: 3,
                distance: Distance::Cosine,
                hnsw: HnswTuning::default(),
            })
            .await
            .unwrap();

        assert_eq!(index.len(COLLECTION), 1);
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let index = index_with_dims(3).await;
        index.upsert(COLLECTION, point(1, "a", vec![1.0, 0.0, 0.0])).await.unwrap();

        let entry = index.get(COLLECTION, 1).unwrap();
        assert_eq!(entry.payload.listing_id, "a");
        assert_eq!(entry.embedding, vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let index = index_with_dims(3).await;
        index.upsert(COLLECTION, point(7, "a", vec![1.0, 0.0, 0.0])).await.unwrap();
        index.upsert(COLLECTION, point(7, "a", vec![0.0, 1.0, 0.0])).await.unwrap();

        assert_eq!(index.count(COLLECTION).await.unwrap(), 1);
        assert_eq!(index.get(COLLECTION, 7).unwrap().embedding, vec![0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_upsert_dimension_mismatch() {
        let index = index_with_dims(3).await;
        let result = index
            .upsert(COLLECTION, point(1, "a", vec![1.0, 0.0, 0.0, 0.0]))
            .await;
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn test_upsert_zero_norm_rejected() {
        let index = index_with_dims(3).await;
        let result = index.upsert(COLLECTION, point(1, "a", vec![0.0, 0.0, 0.0])).await;
        assert!(matches!(result, Err(IndexError::ZeroNormVector)));
    }

    #[tokio::test]
    async fn test_search_orders_by_score() {
        let index = index_with_dims(3).await;
        index.upsert(COLLECTION, point(1, "a", vec![1.0, 0.0, 0.0])).await.unwrap();
        index.upsert(COLLECTION, point(2, "b", vec![0.0, 1.0, 0.0])).await.unwrap();
        index.upsert(COLLECTION, point(3, "c", vec![0.7, 0.7, 0.0])).await.unwrap();

        let results = index
            .search(COLLECTION, &[1.0, 0.1, 0.0], 10, 128)
            .await
            .unwrap();

        let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_with_limit() {
        let index = index_with_dims(3).await;
        for i in 0..10 {
            index
                .upsert(COLLECTION, point(i, "x", vec![1.0, i as f32 * 0.1, 0.0]))
                .await
                .unwrap();
        }

        let results = index.search(COLLECTION, &[1.0, 0.0, 0.0], 3, 128).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, 0);
    }

    #[tokio::test]
    async fn test_search_returns_negative_scores() {
        let index = index_with_dims(2).await;
        index.upsert(COLLECTION, point(1, "a", vec![-1.0, 0.0])).await.unwrap();

        let results = index.search(COLLECTION, &[1.0, 0.0], 5, 128).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score + 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_dimension_mismatch() {
        let index = index_with_dims(3).await;
        let result = index.search(COLLECTION, &[1.0, 0.0], 5, 128).await;
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }
}
