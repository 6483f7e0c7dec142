//! Zero-shot category classification of listing images.
//!
//! The image embedding is compared with the embedding of every vocabulary
//! label; the most similar label decides the category. Label embeddings are
//! computed once, when the classifier is built.

pub mod vocabulary;

use serde::Serialize;
use std::sync::Arc;

pub use vocabulary::{LabelEntry, LabelVocabulary, FALLBACK_CATEGORY};

use crate::{
    errors::AppError,
    images,
    semantic::{vector, Embedder},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category_index: u32,
    pub subcategory_slug: Option<String>,
    /// Raw cosine similarity between the image and the winning label
    pub confidence: f32,
    pub detected_label: String,
}

pub struct Classifier {
    embedder: Arc<dyn Embedder>,
    vocabulary: LabelVocabulary,
    label_vectors: Vec<Vec<f32>>,
}

impl Classifier {
    /// Embed every label of `vocabulary` and keep the vectors.
    pub fn new(embedder: Arc<dyn Embedder>, vocabulary: LabelVocabulary) -> Result<Self, AppError> {
        if vocabulary.is_empty() {
            return Err(AppError::Configuration(
                "label vocabulary is empty".to_string(),
            ));
        }

        let label_vectors = embedder.embed_texts(&vocabulary.labels())?;
        if label_vectors.len() != vocabulary.len() {
            return Err(AppError::Configuration(format!(
                "embedded {} labels, expected {}",
                label_vectors.len(),
                vocabulary.len()
            )));
        }

        log::info!("cached embeddings for {} labels", label_vectors.len());

        Ok(Self {
            embedder,
            vocabulary,
            label_vectors,
        })
    }

    #[cfg(test)]
    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    /// Classify an uploaded image.
    pub async fn classify(&self, image_bytes: &[u8]) -> Result<Classification, AppError> {
        let embedding = tokio::task::block_in_place(|| {
            let img = images::decode_image(image_bytes)?;
            self.embedder.embed_image(&img).map_err(AppError::from)
        })?;

        let result = self.classify_embedding(&embedding);
        log::debug!(
            "classified as '{}' (category {}, confidence {:.3})",
            result.detected_label,
            result.category_index,
            result.confidence
        );
        Ok(result)
    }

    /// Pick the label most similar to `embedding`.
    ///
    /// Ties keep the label that comes first in the vocabulary.
    pub fn classify_embedding(&self, embedding: &[f32]) -> Classification {
        let mut best = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (i, label_vector) in self.label_vectors.iter().enumerate() {
            let score = vector::cosine_similarity(embedding, label_vector);
            if score > best_score {
                best = i;
                best_score = score;
            }
        }

        let label = &self.vocabulary.entries()[best].label;

        Classification {
            category_index: self.vocabulary.category_index(label),
            subcategory_slug: self.vocabulary.subcategory_slug(label).map(str::to_string),
            confidence: best_score,
            detected_label: label.clone(),
        }
    }
}
