//! Embedding infrastructure for listing images and text queries.
//!
//! # Architecture
//!
//! - `embeddings`: Wraps fastembed's CLIP image/text encoders
//! - `dimension`: Startup-time resolution of the embedding dimension
//! - `vector`: Normalization and cosine similarity helpers

pub mod dimension;
pub mod embeddings;
pub mod vector;

pub use dimension::{resolve_dimension, DimensionSource, DEFAULT_DIMENSION};
pub use embeddings::{ClipEmbedder, Embedder, EmbeddingError, DEFAULT_MODEL};
