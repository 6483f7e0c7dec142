//! Startup-time discovery of the embedding dimension.
//!
//! Some backends do not report their output size reliably, so resolution
//! falls through three tiers: the model's declared dimension, the length of a
//! probe embedding, then [`DEFAULT_DIMENSION`]. Each fallback is logged; the
//! resolved value must match any pre-existing index collection.

use super::embeddings::Embedder;

/// Dimension used when the model neither declares nor reveals its size.
pub const DEFAULT_DIMENSION: usize = 512;

const PROBE_TEXT: &str = "dimension probe";

/// Where the resolved dimension came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSource {
    Declared,
    Probe,
    Default,
}

/// Resolve the output dimension of `embedder`. Never fails.
pub fn resolve_dimension(embedder: &dyn Embedder) -> (usize, DimensionSource) {
    match embedder.declared_dimension() {
        Some(dim) if dim > 0 => {
            log::info!(
                "embedding dimension {} declared by model '{}'",
                dim,
                embedder.model_name()
            );
            return (dim, DimensionSource::Declared);
        }
        Some(_) => log::warn!(
            "model '{}' declared a zero dimension, probing instead",
            embedder.model_name()
        ),
        None => log::warn!(
            "model '{}' does not declare its dimension, probing instead",
            embedder.model_name()
        ),
    }

    match embedder.embed_text(PROBE_TEXT) {
        Ok(probe) if !probe.is_empty() => {
            log::info!("embedding dimension {} measured from probe", probe.len());
            return (probe.len(), DimensionSource::Probe);
        }
        Ok(_) => log::warn!("dimension probe returned an empty vector"),
        Err(e) => log::warn!("dimension probe failed: {}", e),
    }

    log::warn!(
        "falling back to default embedding dimension {}; verify it matches model '{}'",
        DEFAULT_DIMENSION,
        embedder.model_name()
    );
    (DEFAULT_DIMENSION, DimensionSource::Default)
}
