//! Core data types, enums, and reports for the evidoc conversion library.
//!
//! This module defines the fundamental data structures used throughout evidoc:
//! - Page settings (`MarginPreset`, `PageGeometry`)
//! - Image descriptors (`Orientation`, `ColorMode`, `EmbedSize`)
//! - The scanned folder tree (`FolderNode`)
//! - Run results and user-facing signals (`AssemblyStats`, `GenerationOutcome`, `UserNotice`)
//! - The single-run trigger gate (`RunGate`, `RunPermit`)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{ColorType, ImageFormat};

use crate::error::{Error, Result};

/// A4 page width in centimetres.
pub const PAGE_WIDTH_CM: f64 = 21.0;
/// A4 page height in centimetres.
pub const PAGE_HEIGHT_CM: f64 = 29.7;
/// Vertical slack kept free so an image never exactly fills the page.
pub const VERTICAL_SLACK_CM: f64 = 1.0;
/// English Metric Units per centimetre (OOXML drawing unit).
pub const EMU_PER_CM: f64 = 360_000.0;

/// Page margin presets, applied uniformly to all four sides.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum MarginPreset {
    #[default]
    Narrow, // 1.27 cm
    Normal,   // 2.54 cm
    Moderate, // 1.9 cm
    Wide,     // 3.17 cm
}

impl MarginPreset {
    pub const ALL: [MarginPreset; 4] = [
        MarginPreset::Narrow,
        MarginPreset::Normal,
        MarginPreset::Moderate,
        MarginPreset::Wide,
    ];

    /// Margin width in centimetres.
    pub fn margin_cm(self) -> f64 {
        match self {
            MarginPreset::Narrow => 1.27,
            MarginPreset::Normal => 2.54,
            MarginPreset::Moderate => 1.9,
            MarginPreset::Wide => 3.17,
        }
    }

    /// The label shown by the original desktop picker.
    pub fn label(self) -> &'static str {
        match self {
            MarginPreset::Narrow => "窄",
            MarginPreset::Normal => "普通",
            MarginPreset::Moderate => "适中",
            MarginPreset::Wide => "宽",
        }
    }
}

impl fmt::Display for MarginPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarginPreset::Narrow => "narrow",
            MarginPreset::Normal => "normal",
            MarginPreset::Moderate => "moderate",
            MarginPreset::Wide => "wide",
        };
        write!(f, "{} ({} cm)", name, self.margin_cm())
    }
}

impl FromStr for MarginPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "narrow" | "窄" => Ok(MarginPreset::Narrow),
            "normal" | "普通" => Ok(MarginPreset::Normal),
            "moderate" | "适中" => Ok(MarginPreset::Moderate),
            "wide" | "宽" => Ok(MarginPreset::Wide),
            other => Err(Error::Unsupported(format!("Margin preset '{}'", other))),
        }
    }
}

/// Page geometry fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageGeometry {
    margin_cm: f64,
}

impl PageGeometry {
    pub fn new(margin_cm: f64) -> Self {
        Self { margin_cm }
    }

    pub fn from_preset(preset: MarginPreset) -> Self {
        Self::new(preset.margin_cm())
    }

    pub fn margin_cm(&self) -> f64 {
        self.margin_cm
    }

    /// Horizontal space between the left and right margins.
    pub fn usable_width_cm(&self) -> f64 {
        PAGE_WIDTH_CM - 2.0 * self.margin_cm
    }

    /// Vertical space between the margins, minus [`VERTICAL_SLACK_CM`].
    pub fn usable_height_cm(&self) -> f64 {
        PAGE_HEIGHT_CM - 2.0 * self.margin_cm - VERTICAL_SLACK_CM
    }
}

impl From<MarginPreset> for PageGeometry {
    fn from(preset: MarginPreset) -> Self {
        Self::from_preset(preset)
    }
}

/// Image orientation. Squares count as landscape.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn from_dimensions(width_px: u32, height_px: u32) -> Self {
        if height_px > width_px {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

/// Colour layout of a decoded image, as far as normalization cares.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorMode {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    Other,
}

impl ColorMode {
    /// Whether the mode carries an alpha channel that has to be dropped.
    pub fn has_alpha(self) -> bool {
        matches!(self, ColorMode::GrayAlpha | ColorMode::Rgba)
    }

    pub fn is_gray(self) -> bool {
        matches!(self, ColorMode::Gray | ColorMode::GrayAlpha)
    }
}

impl From<ColorType> for ColorMode {
    fn from(color: ColorType) -> Self {
        match color {
            ColorType::L8 | ColorType::L16 => ColorMode::Gray,
            ColorType::La8 | ColorType::La16 => ColorMode::GrayAlpha,
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => ColorMode::Rgb,
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => ColorMode::Rgba,
            _ => ColorMode::Other,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorMode::Gray => "L",
            ColorMode::GrayAlpha => "LA",
            ColorMode::Rgb => "RGB",
            ColorMode::Rgba => "RGBA",
            ColorMode::Other => "other",
        };
        f.write_str(name)
    }
}

/// The single physical dimension an image is constrained by when embedded.
/// The other dimension follows from the image's own aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EmbedSize {
    WidthCm(f64),
    HeightCm(f64),
}

impl EmbedSize {
    /// Resolves both extents in EMU for an image of the given pixel size.
    ///
    /// Returns `None` for zero-sized images or non-positive targets.
    pub fn extent_emu(&self, width_px: u32, height_px: u32) -> Option<(u64, u64)> {
        if width_px == 0 || height_px == 0 {
            return None;
        }
        let aspect = width_px as f64 / height_px as f64;
        let (width_cm, height_cm) = match *self {
            EmbedSize::WidthCm(w) => (w, w / aspect),
            EmbedSize::HeightCm(h) => (h * aspect, h),
        };
        if width_cm <= 0.0 || height_cm <= 0.0 {
            return None;
        }
        Some((
            (width_cm * EMU_PER_CM).round() as u64,
            (height_cm * EMU_PER_CM).round() as u64,
        ))
    }
}

/// A folder discovered by the scanner pre-pass.
///
/// The scanned root has depth 0, its direct children depth 1.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FolderNode {
    pub path: PathBuf,
    pub name: String,
    pub depth: usize,
    pub child_folders: Vec<FolderNode>,
    pub images: Vec<PathBuf>,
}

impl FolderNode {
    pub fn is_leaf(&self) -> bool {
        self.child_folders.is_empty()
    }

    /// Number of folders in this subtree, this one included.
    pub fn folder_count(&self) -> usize {
        1 + self
            .child_folders
            .iter()
            .map(FolderNode::folder_count)
            .sum::<usize>()
    }

    /// Images that would be embedded: those of leaf folders only.
    pub fn embeddable_image_count(&self) -> usize {
        if self.is_leaf() {
            self.images.len()
        } else {
            self.child_folders
                .iter()
                .map(FolderNode::embeddable_image_count)
                .sum()
        }
    }
}

/// Counters collected while assembling a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssemblyStats {
    pub folders_emitted: usize,
    pub leaf_folders: usize,
    pub images_embedded: usize,
    pub images_skipped: usize,
    pub embed_failures: usize,
    pub unreadable_folders: usize,
}

/// Result of a successful generation run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GenerationOutcome {
    pub output_path: PathBuf,
    pub stats: AssemblyStats,
}

/// The user-facing signal a presentation shell shows after a trigger.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum UserNotice {
    /// Generation was requested before a folder was chosen.
    Warning(String),
    /// The document was written to this path.
    Success(PathBuf),
    /// The run failed; the message names the failure.
    Error(String),
}

impl UserNotice {
    pub fn from_result(result: &Result<GenerationOutcome>) -> Self {
        match result {
            Ok(outcome) => UserNotice::Success(outcome.output_path.clone()),
            Err(Error::NoSourceSelected) => {
                UserNotice::Warning("Please select a folder first.".to_string())
            }
            Err(e) => UserNotice::Error(format!("Generation failed: {}", e)),
        }
    }
}

/// Gate that keeps a trigger disabled while a run is active.
#[derive(Debug, Clone, Default)]
pub struct RunGate {
    active: Arc<AtomicBool>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the gate, failing with [`Error::RunInProgress`] if a run holds it.
    pub fn try_acquire(&self) -> Result<RunPermit> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RunInProgress)?;
        Ok(RunPermit {
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Held for the duration of a run; re-enables the trigger when dropped.
#[derive(Debug)]
pub struct RunPermit {
    active: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Utility function: Determines the package extension and MIME type for embeddable media.
///
/// # Supported formats
///
/// - JPEG: image/jpeg
/// - PNG: image/png
pub fn get_media_info(format: ImageFormat) -> Result<(&'static str, &'static str)> {
    match format {
        ImageFormat::Jpeg => Ok(("jpeg", "image/jpeg")),
        ImageFormat::Png => Ok(("png", "image/png")),
        other => Err(Error::Unsupported(format!("Media format {:?}", other))),
    }
}
