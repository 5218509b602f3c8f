use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("failed to encode processed image: {0}")]
    Encode(String),
}

/// Largest dimension fed to the recognizer. Tesseract degrades on very
/// large scans, so anything bigger is downscaled first.
const MAX_DIMENSION: u32 = 2800;
/// Receipts photographed at thumbnail size OCR poorly; upscale below this.
const MIN_HEIGHT: u32 = 800;

/// Normalize raw image bytes (JPEG / PNG / WEBP / …) into OCR-ready PNG bytes.
pub fn prepare_for_ocr_from_bytes(data: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_png(normalize(img))
}

/// Resize into the OCR sweet spot, grayscale, contrast-stretch.
fn normalize(img: DynamicImage) -> DynamicImage {
    let img = if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, image::imageops::FilterType::Lanczos3)
    } else if img.height() < MIN_HEIGHT && img.height() > 0 {
        let scale = MIN_HEIGHT as f32 / img.height() as f32;
        let new_w = ((img.width() as f32 * scale) as u32).max(1);
        img.resize_exact(new_w, MIN_HEIGHT, image::imageops::FilterType::CatmullRom)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) =
        gray.pixels().fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    // Uniform image: nothing to stretch.
    if max_px == min_px {
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([((p - min_px) as u32 * 255 / range) as u8])
    });

    DynamicImage::ImageLuma8(stretched)
}

fn encode_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
