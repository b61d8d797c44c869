//! Image codec: decode, resize and encode one request.
//!
//! | Step | Implementation |
//! |------|----------------|
//! | Decode | `image::load_from_memory` (JPEG, PNG, TIFF, WebP) |
//! | Resize | `image` with `Lanczos3`, see [`ResizeStrategy`] |
//! | Encode → JPEG | `JpegEncoder` with quality |
//! | Encode → PNG | `PngEncoder` with compression level |
//! | Encode → WebP | `WebPEncoder` (lossless only) |
//! | Encode → AVIF | `AvifEncoder` (rav1e) with speed and quality |

use super::params::{ImageFormat, ImageRequest, ResizeStrategy};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Trait for image codecs.
///
/// Must be `Sync`: requests are processed in parallel against one codec.
pub trait ImageCodec: Sync {
    fn resize_and_encode(&self, source: &[u8], request: &ImageRequest)
    -> Result<Vec<u8>, CodecError>;
}

/// Pure Rust codec built on the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for RustCodec {
    fn resize_and_encode(
        &self,
        source: &[u8],
        request: &ImageRequest,
    ) -> Result<Vec<u8>, CodecError> {
        let img = image::load_from_memory(source)?;
        let resized = resize(&img, request)?;
        encode(&resized, request)
    }
}

/// Resolve the target box, filling a missing side from the source aspect.
pub fn target_size(source: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (sw, sh) = source;
    let scaled = |num: u32, a: u32, b: u32| -> u32 {
        ((num as f64 * a as f64 / b.max(1) as f64).round() as u32).max(1)
    };
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scaled(w, sh, sw)),
        (None, Some(h)) => (scaled(h, sw, sh), h),
        (None, None) => (sw, sh),
    }
}

fn resize(img: &DynamicImage, request: &ImageRequest) -> Result<DynamicImage, CodecError> {
    let source = img.dimensions();
    let (w, h) = target_size(source, request.width, request.height);
    if w == 0 || h == 0 {
        return Err(CodecError::Unsupported(format!(
            "target size {}x{} for {}",
            w,
            h,
            request.input.display()
        )));
    }
    if (w, h) == source {
        return Ok(img.clone());
    }

    let resized = match request.resize {
        ResizeStrategy::Cover => img.resize_to_fill(w, h, FilterType::Lanczos3),
        ResizeStrategy::Contain | ResizeStrategy::Inside => {
            img.resize(w, h, FilterType::Lanczos3)
        }
        ResizeStrategy::Fill => img.resize_exact(w, h, FilterType::Lanczos3),
        ResizeStrategy::Outside => {
            let (ow, oh) = outside_size(source, (w, h));
            img.resize_exact(ow, oh, FilterType::Lanczos3)
        }
    };
    Ok(resized)
}

/// Smallest aspect-preserving size that covers `target` entirely.
fn outside_size(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = (source.0.max(1) as f64, source.1.max(1) as f64);
    let scale = (target.0 as f64 / sw).max(target.1 as f64 / sh);
    (
        ((sw * scale).round() as u32).max(target.0),
        ((sh * scale).round() as u32).max(target.1),
    )
}

fn encode(img: &DynamicImage, request: &ImageRequest) -> Result<Vec<u8>, CodecError> {
    let opts = &request.format_options;
    let mut buf = Vec::new();
    match request.format {
        ImageFormat::Jpg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, opts.jpg.quality.value() as u8);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        ImageFormat::Png => {
            let compression = match opts.png.compression_level {
                0..=2 => CompressionType::Fast,
                3..=6 => CompressionType::Default,
                _ => CompressionType::Best,
            };
            let encoder = PngEncoder::new_with_quality(&mut buf, compression, PngFilter::Adaptive);
            img.write_with_encoder(encoder)?;
        }
        ImageFormat::Webp => {
            if !opts.webp.lossless {
                return Err(CodecError::Unsupported(
                    "lossy WebP encoding is not available".to_string(),
                ));
            }
            let encoder = WebPEncoder::new_lossless(&mut buf);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
        }
        ImageFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(
                &mut buf,
                opts.avif.speed.clamp(1, 10),
                opts.avif.quality.value() as u8,
            );
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
        }
    }
    Ok(buf)
}
