// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Best-effort image compression before upload
//!
//! Compression is an optimization only. Any failure forwards the original
//! bytes and is logged, never returned.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, warn};

pub use crate::config::CompressionOptions;
use crate::image_source::SelectedImage;
use crate::{Result, SmartTrashError};

const MIN_QUALITY: u8 = 40;
const QUALITY_STEP: u8 = 10;
const MIN_DIMENSION: u32 = 64;
const SHRINK_FACTOR: f32 = 0.8;

/// Bytes ready for upload, always under the original filename
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
    /// False when the original bytes were forwarded
    pub compressed: bool,
}

impl CompressedImage {
    fn original(image: &SelectedImage) -> Self {
        Self {
            bytes: image.bytes().to_vec(),
            filename: image.filename().to_string(),
            mime_type: image.mime_type().to_string(),
            compressed: false,
        }
    }
}

pub struct Compressor {
    options: CompressionOptions,
}

impl Compressor {
    pub fn new(options: CompressionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompressionOptions {
        &self.options
    }

    /// Shrink `image` into the configured envelope, or forward it unchanged
    pub async fn compress(&self, image: &SelectedImage) -> CompressedImage {
        if !self.options.enabled {
            return CompressedImage::original(image);
        }

        let outcome = if self.options.run_off_main_thread {
            let bytes = image.shared_bytes();
            let options = self.options.clone();
            tokio::task::spawn_blocking(move || shrink(&bytes, &options))
                .await
                .unwrap_or_else(|e| Err(SmartTrashError::Compression(format!("worker failed: {}", e))))
        } else {
            shrink(image.bytes(), &self.options)
        };

        match outcome {
            Ok(Some(bytes)) => {
                debug!(
                    "Compressed {}: {} -> {} bytes",
                    image.filename(),
                    image.bytes().len(),
                    bytes.len()
                );
                CompressedImage {
                    bytes,
                    filename: image.filename().to_string(),
                    mime_type: "image/jpeg".to_string(),
                    compressed: true,
                }
            }
            Ok(None) => CompressedImage::original(image),
            Err(e) => {
                warn!("Compression of {} failed, sending original: {}", image.filename(), e);
                CompressedImage::original(image)
            }
        }
    }
}

/// Re-encode as JPEG until it fits. `None` means the original should be kept.
fn shrink(original: &[u8], options: &CompressionOptions) -> Result<Option<Vec<u8>>> {
    let img = image::load_from_memory(original)?;
    let max_dim = options.max_dimension_pixels;
    let (width, height) = img.dimensions();
    let fits_dimensions = width <= max_dim && height <= max_dim;

    if fits_dimensions && original.len() as u64 <= options.max_size_bytes {
        return Ok(None);
    }

    let mut img = if fits_dimensions {
        img
    } else {
        img.resize(max_dim, max_dim, FilterType::Triangle)
    };
    let mut quality = options.initial_quality.max(MIN_QUALITY);

    loop {
        let encoded = encode_jpeg(&img, quality)?;
        let (w, h) = img.dimensions();
        let exhausted = quality <= MIN_QUALITY && w.max(h) <= MIN_DIMENSION;

        if encoded.len() as u64 <= options.max_size_bytes || exhausted {
            if fits_dimensions && encoded.len() >= original.len() {
                return Ok(None);
            }
            return Ok(Some(encoded));
        }

        if quality > MIN_QUALITY {
            quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
        } else {
            let nw = ((w as f32 * SHRINK_FACTOR) as u32).max(1);
            let nh = ((h as f32 * SHRINK_FACTOR) as u32).max(1);
            img = img.resize(nw, nh, FilterType::Triangle);
        }
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
    Ok(buffer)
}
