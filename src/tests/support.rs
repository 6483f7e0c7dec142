//! Shared fixtures: a deterministic colour embedder, contexts backed by the
//! in-memory index, and multipart request bodies.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::sync::Arc;

use crate::{
    app::AppContext,
    config::{Config, IndexBackend},
    index::{IndexStore, MemoryIndex},
    semantic::{vector, Embedder, EmbeddingError},
};

pub const COLLECTION: &str = "test_listing_images";
pub const FAKE_DIMENSION: usize = 6;

pub const RED: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

/// Embeds an image as its mean colour and text as a colour picked from the
/// words it contains. Colour words (and "racefiets", which is red) map to
/// pure colours; any other text gets a muted colour derived from its bytes.
pub struct ColorEmbedder;

impl ColorEmbedder {
    fn colour_vector(r: f32, g: f32, b: f32) -> Vec<f32> {
        let mut v = vec![r, g, b, 1.0 - r, 1.0 - g, 1.0 - b];
        vector::normalize(&mut v);
        v
    }

    fn text_colour(text: &str) -> [f32; 3] {
        let text = text.to_lowercase();
        if text.contains("rood") || text.contains("red") || text.contains("racefiets") {
            return [1.0, 0.0, 0.0];
        }
        if text.contains("groen") || text.contains("green") {
            return [0.0, 1.0, 0.0];
        }
        if text.contains("blauw") || text.contains("blue") {
            return [0.0, 0.0, 1.0];
        }

        let h: u32 = text.bytes().fold(17u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32));
        let channel = |shift: u32| 0.2 + 0.6 * ((h >> shift) % 101) as f32 / 100.0;
        [channel(0), channel(8), channel(16)]
    }
}

impl Embedder for ColorEmbedder {
    fn model_name(&self) -> &str {
        "fake-colour"
    }

    fn declared_dimension(&self) -> Option<usize> {
        Some(FAKE_DIMENSION)
    }

    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>, EmbeddingError> {
        let rgb = image.to_rgb8();
        let n = (rgb.width() * rgb.height()) as f32;
        let mut sum = [0.0f32; 3];
        for pixel in rgb.pixels() {
            for (c, s) in sum.iter_mut().enumerate() {
                *s += pixel[c] as f32 / 255.0;
            }
        }
        Ok(Self::colour_vector(sum[0] / n, sum[1] / n, sum[2] / n))
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let [r, g, b] = Self::text_colour(text);
        Ok(Self::colour_vector(r, g, b))
    }
}

pub fn test_config() -> Config {
    Config {
        collection: COLLECTION.to_string(),
        index_backend: IndexBackend::Memory,
        ..Default::default()
    }
}

pub async fn test_context_with(config: Config, store: Arc<dyn IndexStore>) -> AppContext {
    AppContext::from_parts(config, Arc::new(ColorEmbedder), store)
        .await
        .expect("context should build")
}

/// Context over a fresh in-memory index; the index is returned for
/// inspection.
pub async fn test_context() -> (AppContext, Arc<MemoryIndex>) {
    let index = Arc::new(MemoryIndex::new());
    let ctx = test_context_with(test_config(), index.clone()).await;
    (ctx, index)
}

/// A `size`x`size` square of one colour, encoded as `format`.
pub fn square(colour: [u8; 3], size: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(size, size, Rgb(colour));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), format)
        .expect("encode test image");
    buf
}

pub fn png_square(colour: [u8; 3]) -> Vec<u8> {
    square(colour, 10, ImageFormat::Png)
}

const BOUNDARY: &str = "XlistingLensBoundaryX";

/// Build a `multipart/form-data` body. Returns `(content_type, body)`.
pub fn multipart(fields: &[(&str, &str)], file: Option<&[u8]>) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    if let Some(bytes) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"image.png\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
