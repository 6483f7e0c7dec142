//! Service bootstrap and shared state.
//!
//! Startup order: embedder, dimension, index store, collection, classifier.
//! Any failure along the way aborts startup.

use std::sync::Arc;

use crate::{
    classify::{Classifier, LabelVocabulary},
    config::{Config, IndexBackend},
    errors::AppError,
    index::{ensure_collection, CollectionConfig, Distance, IndexStore, MemoryIndex, QdrantStore},
    search::{SearchService, SearchSettings},
    semantic::{resolve_dimension, ClipEmbedder, DimensionSource, Embedder},
};

/// Application context shared by all request handlers.
pub struct AppContext {
    config: Config,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    search: SearchService,
    classifier: Classifier,
    dimension: usize,
}

impl AppContext {
    /// Build the production context described by `config`.
    ///
    /// Loads the CLIP model (downloading it on first use), so this blocks.
    pub async fn bootstrap(config: Config) -> Result<Self, AppError> {
        log::info!("loading embedding model '{}'", config.model);
        let embedder: Arc<dyn Embedder> = Arc::new(
            ClipEmbedder::new(&config.model, config.model_cache_dir.clone()).map_err(|e| {
                AppError::Configuration(format!("cannot load model '{}': {}", config.model, e))
            })?,
        );

        let store = build_store(&config)?;

        Self::from_parts(config, embedder, store).await
    }

    /// Assemble a context from an already built embedder and store.
    pub async fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self, AppError> {
        let (dimension, source) = resolve_dimension(embedder.as_ref());
        if source == DimensionSource::Default {
            log::warn!(
                "collection '{}' will be created with fallback dimension {}",
                config.collection,
                dimension
            );
        }

        ensure_collection(store.as_ref(), &collection_config(&config, dimension)).await?;

        let classifier = Classifier::new(embedder.clone(), LabelVocabulary::marketplace().clone())?;

        let search = SearchService::new(embedder.clone(), store.clone(), search_settings(&config));

        Ok(Self {
            config,
            embedder,
            store,
            search,
            classifier,
            dimension,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn search(&self) -> &SearchService {
        &self.search
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embedding dimension resolved at startup.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn build_store(config: &Config) -> Result<Arc<dyn IndexStore>, AppError> {
    match config.index_backend {
        IndexBackend::Qdrant => {
            log::info!("using qdrant index at {}", config.qdrant_url);
            let store = QdrantStore::new(
                &config.qdrant_url,
                config.qdrant_api_key.clone(),
                config.index_timeout(),
            )
            .map_err(|e| AppError::Configuration(format!("cannot build index client: {e}")))?;
            Ok(Arc::new(store))
        }
        IndexBackend::Memory => {
            log::warn!("using in-memory index, nothing will be persisted");
            Ok(Arc::new(MemoryIndex::new()))
        }
    }
}

fn collection_config(config: &Config, dimension: usize) -> CollectionConfig {
    CollectionConfig {
        name: config.collection.clone(),
        dimension,
        distance: Distance::Cosine,
        hnsw: config.hnsw(),
    }
}

fn search_settings(config: &Config) -> SearchSettings {
    SearchSettings {
        collection: config.collection.clone(),
        high_confidence_threshold: config.high_confidence_threshold,
        hnsw_ef: config.search_hnsw_ef,
        max_limit: config.max_search_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_store_follows_backend() {
        let config = Config {
            index_backend: IndexBackend::Memory,
            ..Default::default()
        };
        assert_eq!(build_store(&config).unwrap().backend(), "memory");

        let config = Config::default();
        assert_eq!(build_store(&config).unwrap().backend(), "qdrant");
    }

    #[test]
    fn test_collection_config_uses_tuning() {
        let config = Config {
            hnsw_m: 32,
            hnsw_ef_construct: 256,
            ..Default::default()
        };
        let collection = collection_config(&config, 512);
        assert_eq!(collection.dimension, 512);
        assert_eq!(collection.hnsw.m, 32);
        assert_eq!(collection.hnsw.ef_construct, 256);
    }
}
