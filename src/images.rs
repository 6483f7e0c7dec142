//! Decoding of uploaded image bytes.

use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::errors::AppError;

/// Decode uploaded bytes into a pixel buffer.
///
/// Any format the `image` crate can sniff is accepted. Empty or
/// undecodable input is `InvalidInput`.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, AppError> {
    if data.is_empty() {
        return Err(AppError::InvalidInput("empty image upload".to_string()));
    }

    let img = image::load_from_memory(data)?;

    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(AppError::InvalidInput(format!("image has no pixels ({w}x{h})")));
    }

    log::debug!(
        "decoded {:?} image {}x{} ({} bytes)",
        detect_format(data),
        w,
        h,
        data.len()
    );

    Ok(img)
}

/// Detect image format from bytes
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data).ok()
}
