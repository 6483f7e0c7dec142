use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    errors::AppError,
    index::HnswTuning,
    search::{DEFAULT_HIGH_CONFIDENCE_THRESHOLD, DEFAULT_SEARCH_HNSW_EF},
    semantic::DEFAULT_MODEL,
};

const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
const DEFAULT_COLLECTION: &str = "listing_images";
const DEFAULT_MODEL_CACHE_DIR: &str = ".fastembed_cache";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9000";
/// Default timeout for index engine requests in seconds
const DEFAULT_INDEX_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_SEARCH_LIMIT: usize = 256;
const DEFAULT_MAX_UPLOAD_MB: usize = 20;

/// Which index engine backs the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Qdrant,
    Memory,
}

impl std::str::FromStr for IndexBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(IndexBackend::Qdrant),
            "memory" => Ok(IndexBackend::Memory),
            other => Err(AppError::Configuration(format!(
                "unknown index backend '{other}', expected 'qdrant' or 'memory'"
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base url of the Qdrant REST API
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    /// Collection holding listing image vectors
    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub index_backend: IndexBackend,

    /// Embedding model name (e.g., "clip-vit-b-32")
    #[serde(default = "default_model")]
    pub model: String,

    /// Directory to cache downloaded model weights
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: PathBuf,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Timeout for each index engine request in seconds
    #[serde(default = "default_index_timeout_secs")]
    pub index_timeout_secs: u64,

    /// Image search drops results scoring at or below this
    #[serde(default = "default_high_confidence_threshold")]
    pub high_confidence_threshold: f32,

    /// ANN search width used for every query, independent of the limit
    #[serde(default = "default_search_hnsw_ef")]
    pub search_hnsw_ef: usize,

    /// HNSW graph degree used when creating the collection
    #[serde(default = "default_hnsw_m")]
    pub hnsw_m: usize,

    /// HNSW construction search width used when creating the collection
    #[serde(default = "default_hnsw_ef_construct")]
    pub hnsw_ef_construct: usize,

    #[serde(default = "default_max_search_limit")]
    pub max_search_limit: usize,

    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            qdrant_api_key: None,
            collection: default_collection(),
            index_backend: IndexBackend::default(),
            model: default_model(),
            model_cache_dir: default_model_cache_dir(),
            bind_addr: default_bind_addr(),
            index_timeout_secs: default_index_timeout_secs(),
            high_confidence_threshold: default_high_confidence_threshold(),
            search_hnsw_ef: default_search_hnsw_ef(),
            hnsw_m: default_hnsw_m(),
            hnsw_ef_construct: default_hnsw_ef_construct(),
            max_search_limit: default_max_search_limit(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_model_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_CACHE_DIR)
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_index_timeout_secs() -> u64 {
    DEFAULT_INDEX_TIMEOUT_SECS
}

fn default_high_confidence_threshold() -> f32 {
    DEFAULT_HIGH_CONFIDENCE_THRESHOLD
}

fn default_search_hnsw_ef() -> usize {
    DEFAULT_SEARCH_HNSW_EF
}

fn default_hnsw_m() -> usize {
    HnswTuning::default().m
}

fn default_hnsw_ef_construct() -> usize {
    HnswTuning::default().ef_construct
}

fn default_max_search_limit() -> usize {
    DEFAULT_MAX_SEARCH_LIMIT
}

fn default_max_upload_mb() -> usize {
    DEFAULT_MAX_UPLOAD_MB
}

impl Config {
    /// Defaults, overlaid with the YAML file at `path` (when given), overlaid
    /// with environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_yaml_file(path: &Path) -> Result<Self, AppError> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_yml::from_str(&config_str).map_err(|e| {
            AppError::Configuration(format!("config {} is malformed: {}", path.display(), e))
        })
    }

    /// Override fields from environment variables looked up through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("QDRANT_URL") {
            self.qdrant_url = v;
        }
        if let Some(v) = var("QDRANT_API_KEY") {
            self.qdrant_api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some(v) = var("QDRANT_COLLECTION") {
            self.collection = v;
        }
        if let Some(v) = var("INDEX_BACKEND") {
            self.index_backend = v.parse()?;
        }
        if let Some(v) = var("CLIP_MODEL") {
            self.model = v;
        }
        if let Some(v) = var("MODEL_CACHE_DIR") {
            self.model_cache_dir = PathBuf::from(v);
        }
        if let Some(v) = var("BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = var("INDEX_TIMEOUT_SECS") {
            self.index_timeout_secs = parse_env("INDEX_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("HIGH_CONFIDENCE_THRESHOLD") {
            self.high_confidence_threshold = parse_env("HIGH_CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = var("SEARCH_HNSW_EF") {
            self.search_hnsw_ef = parse_env("SEARCH_HNSW_EF", &v)?;
        }
        if let Some(v) = var("HNSW_M") {
            self.hnsw_m = parse_env("HNSW_M", &v)?;
        }
        if let Some(v) = var("HNSW_EF_CONSTRUCT") {
            self.hnsw_ef_construct = parse_env("HNSW_EF_CONSTRUCT", &v)?;
        }
        if let Some(v) = var("MAX_SEARCH_LIMIT") {
            self.max_search_limit = parse_env("MAX_SEARCH_LIMIT", &v)?;
        }
        if let Some(v) = var("MAX_UPLOAD_MB") {
            self.max_upload_mb = parse_env("MAX_UPLOAD_MB", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.index_backend == IndexBackend::Qdrant {
            url::Url::parse(&self.qdrant_url).map_err(|e| {
                AppError::Configuration(format!("qdrant_url '{}' is invalid: {}", self.qdrant_url, e))
            })?;
        }

        if self.collection.trim().is_empty() {
            return Err(AppError::Configuration("collection must not be empty".to_string()));
        }

        if !(-1.0..=1.0).contains(&self.high_confidence_threshold) {
            return Err(AppError::Configuration(format!(
                "high_confidence_threshold must be between -1.0 and 1.0, got {}",
                self.high_confidence_threshold
            )));
        }

        for (name, value) in [
            ("index_timeout_secs", self.index_timeout_secs as usize),
            ("search_hnsw_ef", self.search_hnsw_ef),
            ("hnsw_m", self.hnsw_m),
            ("hnsw_ef_construct", self.hnsw_ef_construct),
            ("max_search_limit", self.max_search_limit),
            ("max_upload_mb", self.max_upload_mb),
        ] {
            if value == 0 {
                return Err(AppError::Configuration(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        Ok(())
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }

    /// Upload body limit in bytes, saturating at `usize::MAX`.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn hnsw(&self) -> HnswTuning {
        HnswTuning {
            m: self.hnsw_m,
            ef_construct: self.hnsw_ef_construct,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        AppError::Configuration(format!("{key}={value:?} is invalid: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.qdrant_url, "http://localhost:6333");
        assert_eq!(config.collection, "listing_images");
        assert_eq!(config.model, "clip-vit-b-32");
        assert_eq!(config.index_backend, IndexBackend::Qdrant);
        assert!((config.high_confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("QDRANT_URL", "http://qdrant:6333"),
                ("QDRANT_COLLECTION", "images_v2"),
                ("INDEX_BACKEND", "Memory"),
                ("HIGH_CONFIDENCE_THRESHOLD", "0.7"),
                ("INDEX_TIMEOUT_SECS", "3"),
                ("QDRANT_API_KEY", ""),
            ]))
            .unwrap();

        assert_eq!(config.qdrant_url, "http://qdrant:6333");
        assert_eq!(config.collection, "images_v2");
        assert_eq!(config.index_backend, IndexBackend::Memory);
        assert!((config.high_confidence_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.index_timeout(), Duration::from_secs(3));
        assert_eq!(config.qdrant_api_key, None);
    }

    #[test]
    fn test_env_parse_error() {
        let mut config = Config::default();
        let result = config.apply_env(env(&[("SEARCH_HNSW_EF", "lots")]));
        assert!(matches!(result, Err(AppError::Configuration(_))));

        let result = config.apply_env(env(&[("INDEX_BACKEND", "faiss")]));
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            high_confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            index_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            qdrant_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // url is irrelevant for the memory backend
        let config = Config {
            qdrant_url: "not a url".to_string(),
            index_backend: IndexBackend::Memory,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_upload_bytes_saturates() {
        let config = Config::default();
        assert_eq!(config.max_upload_bytes(), 20 * 1024 * 1024);

        let config = Config {
            max_upload_mb: usize::MAX,
            ..Default::default()
        };
        assert_eq!(config.max_upload_bytes(), usize::MAX);
    }

    #[test]
    fn test_yaml_file_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "collection: from_file\nsearch_hnsw_ef: 64\nindex_backend: memory\n",
        )
        .unwrap();

        let config = Config::from_yaml_file(&path).unwrap();
        assert_eq!(config.collection, "from_file");
        assert_eq!(config.search_hnsw_ef, 64);
        assert_eq!(config.index_backend, IndexBackend::Memory);
        assert_eq!(config.model, "clip-vit-b-32");
    }

    #[test]
    fn test_malformed_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "search_hnsw_ef: [1, 2").unwrap();

        assert!(matches!(
            Config::from_yaml_file(&path),
            Err(AppError::Configuration(_))
        ));
    }
}
