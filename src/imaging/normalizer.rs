use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use tokio::fs;
use tokio::task::spawn_blocking;

use crate::diagnostics::{SkipReason, truncate_message};
use crate::imaging::layout::{DEFAULT_MAX_DIMENSION, downsample_dimensions};
use crate::path_utils::{path_to_string_lossy, unique_scratch_path};
use crate::types::{ColorMode, Orientation};

/// Default JPEG quality of working copies.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// A scratch file removed when dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "Failed to remove scratch file '{}': {}",
                    path_to_string_lossy(&self.path),
                    e
                );
            }
        }
    }
}

/// The embed-ready working copy of a source image.
#[derive(Debug)]
pub struct NormalizedImage {
    pub source: PathBuf,
    /// Size and colour mode as decoded, before any conversion.
    pub original_width: u32,
    pub original_height: u32,
    pub original_mode: ColorMode,
    pub width_px: u32,
    pub height_px: u32,
    pub converted_to_rgb: bool,
    pub resized: bool,
    artifact: TempArtifact,
}

impl NormalizedImage {
    /// Path of the working copy. Valid until this value is dropped.
    pub fn path(&self) -> &Path {
        self.artifact.path()
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::from_dimensions(self.width_px, self.height_px)
    }
}

/// Produces opaque, size-capped JPEG working copies of source images.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    max_dimension: u32,
    jpeg_quality: u8,
    scratch_dir: PathBuf,
}

impl ImageNormalizer {
    pub fn new(max_dimension: u32, jpeg_quality: u8, scratch_dir: PathBuf) -> Self {
        Self {
            max_dimension,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            scratch_dir,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Normalizes one image. The source file is never modified.
    ///
    /// Fails with a [`SkipReason`] when the file is missing or empty, cannot be
    /// decoded, or the working copy cannot be written. Nothing is left in the
    /// scratch directory on failure.
    pub async fn normalize(&self, source: &Path) -> std::result::Result<NormalizedImage, SkipReason> {
        let metadata = match fs::metadata(source).await {
            Ok(m) if m.is_file() => m,
            _ => return Err(SkipReason::Missing),
        };
        if metadata.len() == 0 {
            return Err(SkipReason::Empty);
        }

        fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| SkipReason::Encode(truncate_message(&e.to_string())))?;

        let source = source.to_path_buf();
        let target = unique_scratch_path(&self.scratch_dir, &source);
        let max_dimension = self.max_dimension;
        let quality = self.jpeg_quality;

        spawn_blocking(move || normalize_blocking(source, target, max_dimension, quality))
            .await
            .map_err(|e| SkipReason::Decode(truncate_message(&e.to_string())))?
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_DIMENSION,
            DEFAULT_JPEG_QUALITY,
            crate::path_utils::scratch_dir(None),
        )
    }
}

fn normalize_blocking(
    source: PathBuf,
    target: PathBuf,
    max_dimension: u32,
    quality: u8,
) -> std::result::Result<NormalizedImage, SkipReason> {
    let decode_err = |e: &dyn std::fmt::Display| SkipReason::Decode(truncate_message(&e.to_string()));

    let decoded = ImageReader::open(&source)
        .map_err(|e| decode_err(&e))?
        .with_guessed_format()
        .map_err(|e| decode_err(&e))?
        .decode()
        .map_err(|e| decode_err(&e))?;

    let original_width = decoded.width();
    let original_height = decoded.height();
    let original_mode = ColorMode::from(decoded.color());
    let converted_to_rgb = original_mode.has_alpha();

    // Alpha is discarded, not composited.
    let mut working = if original_mode == ColorMode::Gray {
        DynamicImage::ImageLuma8(decoded.to_luma8())
    } else {
        DynamicImage::ImageRgb8(decoded.to_rgb8())
    };

    let resized = match downsample_dimensions(original_width, original_height, max_dimension) {
        Some((width, height)) => {
            working = working.resize_exact(width, height, FilterType::Lanczos3);
            true
        }
        None => false,
    };

    let artifact = TempArtifact::new(target);
    write_jpeg(&working, artifact.path(), quality)
        .map_err(|e| SkipReason::Encode(truncate_message(&e)))?;

    Ok(NormalizedImage {
        source,
        original_width,
        original_height,
        original_mode,
        width_px: working.width(),
        height_px: working.height(),
        converted_to_rgb,
        resized,
        artifact,
    })
}

fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> std::result::Result<(), String> {
    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}
