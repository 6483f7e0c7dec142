//! Embedding model wrapper for fastembed's CLIP encoders.
//!
//! Images and text go through a matched pair of encoders that share one
//! vector space, which is what makes text queries able to find images.
//! Every vector leaving [`ClipEmbedder`] is L2-normalized.

use fastembed::{
    ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, TextEmbedding, TextInitOptions,
};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Mutex;

use super::vector;

/// Default multimodal model; same weights as openai/clip-vit-base-patch32.
pub const DEFAULT_MODEL: &str = "clip-vit-b-32";

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Encoder returned a zero vector")]
    ZeroVector,
}

/// Image and text encoder sharing one embedding space.
///
/// Implementations must return unit-length vectors from both `embed_*`
/// methods.
pub trait Embedder: Send + Sync {
    /// Model identifier, for logs and diagnostics.
    fn model_name(&self) -> &str;

    /// Output dimension as reported by the model, when it reports one.
    fn declared_dimension(&self) -> Option<usize>;

    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts. The default embeds them one by one.
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed_text(text)).collect()
    }
}

/// fastembed-backed CLIP encoder pair.
/// Uses a Mutex per session because fastembed's embed() requires &mut self.
pub struct ClipEmbedder {
    text: Mutex<TextEmbedding>,
    image: Mutex<ImageEmbedding>,
    text_model: fastembed::EmbeddingModel,
    model_name: String,
}

impl ClipEmbedder {
    /// Load (downloading on first use) the encoder pair named `model_name`.
    ///
    /// Weights are cached under `cache_dir`.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let (text_model, image_model) = Self::parse_model_name(model_name)?;

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create model cache directory: {}", e))
        })?;

        log::info!("loading text encoder {:?}", text_model);
        let text = TextEmbedding::try_new(
            TextInitOptions::new(text_model.clone())
                .with_cache_dir(cache_dir.clone())
                .with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        log::info!("loading image encoder {:?}", image_model);
        let image = ImageEmbedding::try_new(
            ImageInitOptions::new(image_model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        Ok(Self {
            text: Mutex::new(text),
            image: Mutex::new(image),
            text_model,
            model_name: model_name.to_string(),
        })
    }

    /// Parse model name string to the fastembed (text, image) encoder pair.
    fn parse_model_name(
        name: &str,
    ) -> Result<(fastembed::EmbeddingModel, ImageEmbeddingModel), EmbeddingError> {
        match name.to_lowercase().as_str() {
            "clip-vit-b-32" | "clip-vit-base-patch32" | "openai/clip-vit-base-patch32" => Ok((
                fastembed::EmbeddingModel::ClipVitB32,
                ImageEmbeddingModel::ClipVitB32,
            )),
            "nomic-embed-v1.5" | "nomic-embed-vision-v1.5" => Ok((
                fastembed::EmbeddingModel::NomicEmbedTextV15,
                ImageEmbeddingModel::NomicEmbedVisionV15,
            )),
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported models: clip-vit-b-32, nomic-embed-v1.5",
                name
            ))),
        }
    }

    fn finish(mut embedding: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
        if !vector::normalize(&mut embedding) {
            return Err(EmbeddingError::ZeroVector);
        }
        Ok(embedding)
    }
}

impl Embedder for ClipEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn declared_dimension(&self) -> Option<usize> {
        TextEmbedding::get_model_info(&self.text_model)
            .map(|info| info.dim)
            .ok()
    }

    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>, EmbeddingError> {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| EmbeddingError::EmbeddingFailed(format!("Failed to re-encode image: {}", e)))?;

        let mut model = self.image.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embedding = model
            .embed_bytes(&[png.as_slice()], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))?;

        Self::finish(embedding)
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut model = self.text.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embedding = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))?;

        Self::finish(embedding)
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.text.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
            .into_iter()
            .map(Self::finish)
            .collect()
    }
}
