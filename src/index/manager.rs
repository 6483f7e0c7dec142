//! Startup bootstrap of the index collection.
//!
//! Get-or-create, not get-or-validate: an existing collection is left alone
//! even when its vector size differs from the resolved embedder dimension.
//! That mismatch is only logged; upserts will then be rejected by the engine
//! until the operator drops and recreates the collection.

use super::{CollectionConfig, IndexStore};
use crate::errors::AppError;

/// Make sure `config.name` exists, creating it when it is absent or its
/// metadata cannot be fetched. A failed creation is a configuration error.
pub async fn ensure_collection(
    store: &dyn IndexStore,
    config: &CollectionConfig,
) -> Result<(), AppError> {
    match store.collection_info(&config.name).await {
        Ok(Some(info)) => {
            match info.dimension {
                Some(dim) if dim != config.dimension => log::warn!(
                    "collection '{}' has dimension {} but the embedder produces {}; \
                     drop and recreate the collection before indexing",
                    config.name,
                    dim,
                    config.dimension
                ),
                _ => {}
            }
            log::info!(
                "using existing {} collection '{}' ({} points)",
                store.backend(),
                config.name,
                info.points
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            return Ok(());
        }
        Ok(None) => log::info!("collection '{}' not found, creating", config.name),
        Err(e) => log::warn!(
            "could not fetch collection '{}' ({}), attempting to create it",
            config.name,
            e
        ),
    }

    store.create_collection(config).await.map_err(|e| {
        AppError::Configuration(format!(
            "failed to create collection '{}': {}",
            config.name, e
        ))
    })?;

    log::info!(
        "created {} collection '{}' (dim={}, distance={:?}, m={}, ef_construct={})",
        store.backend(),
        config.name,
        config.dimension,
        config.distance,
        config.hnsw.m,
        config.hnsw.ef_construct
    );

    Ok(())
}
