use crate::{index::IndexError, semantic::EmbeddingError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("index unavailable: {0}")]
    IndexUnavailable(#[from] IndexError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::InvalidInput(format!("not a decodable image: {err}"))
    }
}
