//! Image preparation before upload.
//!
//! Large photos are shrunk and re-encoded so uploads stay small and the
//! generation service gets a predictable input size.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader};
use log::{debug, error, info};

use crate::clients::UploadError;

/// Largest edge of an uploaded image, in pixels
pub const MAX_DIMENSION: u32 = 2048;
/// JPEG quality used when re-encoding
pub const JPEG_QUALITY: u8 = 85;

/// File ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub path: PathBuf,
    /// Whether `path` is a scratch copy the caller should remove after upload
    pub scratch: bool,
}

#[async_trait]
pub trait ImagePreparer: Send + Sync {
    async fn prepare(&self, source: &Path) -> Result<PreparedImage, UploadError>;
}

/// Uploads the source file as-is
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

#[async_trait]
impl ImagePreparer for Passthrough {
    async fn prepare(&self, source: &Path) -> Result<PreparedImage, UploadError> {
        Ok(PreparedImage {
            path: source.to_path_buf(),
            scratch: false,
        })
    }
}

/// Shrinks to at most [`MAX_DIMENSION`] on the longest edge and re-encodes as JPEG
pub struct Downscaler {
    scratch_dir: PathBuf,
    max_dimension: u32,
    quality: u8,
}

impl Downscaler {
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self {
            scratch_dir,
            max_dimension: MAX_DIMENSION,
            quality: JPEG_QUALITY,
        }
    }
}

/// Target size that fits inside `max` on both edges, or `None` if already small enough
pub(crate) fn fit_within(width: u32, height: u32, max: u32) -> Option<(u32, u32)> {
    if width <= max && height <= max {
        return None;
    }

    let scale = max as f64 / width.max(height) as f64;
    let scaled = |edge: u32| ((edge as f64 * scale).round() as u32).clamp(1, max);
    Some((scaled(width), scaled(height)))
}

fn downscale_to_jpeg(
    source: &Path,
    target: &Path,
    max_dimension: u32,
    quality: u8,
) -> Result<(), UploadError> {
    let decode_error = |e: ImageError| match e {
        ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            UploadError::FileNotFound(source.display().to_string())
        }
        other => UploadError::ImageError(other.to_string()),
    };

    let reader = ImageReader::open(source)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| decode_error(ImageError::IoError(e)))?;
    let mut decoder = reader.into_decoder().map_err(decode_error)?;

    // The re-encoded JPEG carries no EXIF tag, so rotation goes into the pixels
    let orientation = decoder.orientation().map_err(decode_error)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    image.apply_orientation(orientation);

    let image = match fit_within(image.width(), image.height(), max_dimension) {
        Some((width, height)) => {
            debug!(
                "Resizing {}x{} -> {}x{}",
                image.width(),
                image.height(),
                width,
                height
            );
            image.resize_exact(width, height, FilterType::Lanczos3)
        }
        None => image,
    };

    let file = std::fs::File::create(target)?;
    let mut writer = std::io::BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(&image.to_rgb8())
        .map_err(|e| UploadError::ImageError(e.to_string()))?;
    writer.flush()?;

    Ok(())
}

#[async_trait]
impl ImagePreparer for Downscaler {
    async fn prepare(&self, source: &Path) -> Result<PreparedImage, UploadError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let target = self
            .scratch_dir
            .join(format!("upload_{}.jpg", uuid::Uuid::new_v4()));
        let source_path = source.to_path_buf();
        let target_path = target.clone();
        let max_dimension = self.max_dimension;
        let quality = self.quality;

        let result = tokio::task::spawn_blocking(move || {
            downscale_to_jpeg(&source_path, &target_path, max_dimension, quality)
        })
        .await
        .map_err(|e| UploadError::ImageError(format!("Image task failed: {}", e)))?;

        if let Err(e) = result {
            error!("Failed to prepare {:?}: {}", source, e);
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e);
        }

        info!("Prepared {:?} as {:?}", source, target);
        Ok(PreparedImage {
            path: target,
            scratch: true,
        })
    }
}
