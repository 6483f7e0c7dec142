//! Vector index storage for listing image embeddings.
//!
//! # Architecture
//!
//! - `qdrant`: REST client for a Qdrant ANN engine (production backend)
//! - `memory`: In-process brute-force cosine index (development backend)
//! - `manager`: Startup get-or-create of the collection
//!
//! Both backends implement [`IndexStore`]. Search results come back ordered
//! by descending score; callers filter them but never re-sort.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod manager;
pub mod memory;
pub mod qdrant;

pub use manager::ensure_collection;
pub use memory::MemoryIndex;
pub use qdrant::QdrantStore;

/// Payload stored next to each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointPayload {
    pub listing_id: String,
    pub image_url: String,
}

/// A vector plus payload, addressed by a content-derived id.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Search hit from the index engine.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: u64,
    /// Cosine similarity (-1.0 to 1.0)
    pub score: f32,
    pub payload: PointPayload,
}

/// Distance metric of a collection. Only cosine is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
}

/// HNSW graph parameters applied when the collection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswTuning {
    /// Graph degree
    pub m: usize,
    /// Search width during graph construction
    pub ef_construct: usize,
}

impl Default for HnswTuning {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construct: 100,
        }
    }
}

/// Everything needed to create a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionConfig {
    pub name: String,
    pub dimension: usize,
    pub distance: Distance,
    pub hnsw: HnswTuning,
}

/// What the engine reports about an existing collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Configured vector size, when the engine exposes it
    pub dimension: Option<usize>,
    pub points: Option<u64>,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Index engine unreachable: {0}")]
    Unreachable(String),

    #[error("Index engine returned {status}: {message}")]
    Engine { status: u16, message: String },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,

    #[error("Malformed index engine response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IndexError::MalformedResponse(err.to_string())
        } else {
            IndexError::Unreachable(err.to_string())
        }
    }
}

/// ANN engine contract: collection bootstrap, upsert and top-K search.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// `Ok(None)` when the collection does not exist.
    async fn collection_info(&self, collection: &str)
        -> Result<Option<CollectionInfo>, IndexError>;

    async fn create_collection(&self, config: &CollectionConfig) -> Result<(), IndexError>;

    /// Insert or overwrite the point with `point.id`.
    async fn upsert(&self, collection: &str, point: IndexPoint) -> Result<(), IndexError>;

    /// Top `limit` points by cosine similarity, highest first.
    ///
    /// `hnsw_ef` is the engine's search-quality knob and is independent of
    /// `limit`.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        hnsw_ef: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError>;

    async fn count(&self, collection: &str) -> Result<u64, IndexError>;
}
