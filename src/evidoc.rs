use std::path::{Path, PathBuf};

use chrono::Local;

use crate::assembler::DocumentAssembler;
use crate::collector::{Collector, DEFAULT_MAX_DEPTH};
use crate::diagnostics::{DiagnosticLog, EventKind, Reporter, truncate_message};
use crate::error::{Error, Result};
use crate::generator::DocumentBuilder;
use crate::generator::docx::Docx;
use crate::imaging::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, DEFAULT_SCALE_FACTOR, DEFAULT_WIDTH_FIT_RATIO,
    ImageNormalizer, PageFit,
};
use crate::path_utils::{display_name, output_file_name, scratch_dir, validate_source_dir};
use crate::types::{FolderNode, GenerationOutcome, MarginPreset, PageGeometry, RunGate};

/// Default file name prefix of generated documents ("evidence material").
pub const DEFAULT_OUTPUT_PREFIX: &str = "佐证材料";

/// The evidoc run configuration, built declaratively using the builder pattern.
///
/// One configuration describes one source folder and how its images are laid
/// out. A run walks the folder, writes `<source>/<prefix>_<YYYYMMDD_HHMMSS>.docx`
/// and records every step in a [`DiagnosticLog`]:
///
/// - [`generate`](EvidocConfig::generate): full run with the DOCX writer
/// - [`generate_with`](EvidocConfig::generate_with): full run with any [`DocumentBuilder`]
/// - [`generate_exclusive`](EvidocConfig::generate_exclusive): full run guarded by a [`RunGate`]
/// - [`analyze_source`](EvidocConfig::analyze_source): scanner pre-pass only
///
/// ```rust,no_run
/// # use evidoc::prelude::*;
/// # #[tokio::main]
/// # async fn main() -> evidoc::error::Result<()> {
/// let config = EvidocConfig::builder()
///     .source_path("./evidence")
///     .margin(MarginPreset::Normal)
///     .build()?;
///
/// let mut log = DiagnosticLog::new();
/// let outcome = config.generate(&mut log).await?;
/// println!("Saved {}", outcome.output_path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EvidocConfig {
    /// Root folder to document. Its name becomes the document title.
    ///
    /// Left empty, a run reports [`Error::NoSourceSelected`] and does nothing.
    #[builder(default)]
    pub source_path: PathBuf,

    /// Page margin preset, applied uniformly to all four sides.
    #[builder(default)]
    pub margin: MarginPreset,

    /// Fraction of the usable page height (portrait) or width (landscape) an
    /// image may take, in `(0, 1]`.
    #[builder(default = "DEFAULT_SCALE_FACTOR")]
    pub scale_factor: f64,

    /// Additional width reduction for landscape images, in `(0, 1]`.
    #[builder(default = "DEFAULT_WIDTH_FIT_RATIO")]
    pub width_fit_ratio: f64,

    /// Longest side, in pixels, of embedded working copies.
    #[builder(default = "DEFAULT_MAX_DIMENSION")]
    pub max_image_dimension: u32,

    /// JPEG quality (1-100) of embedded working copies.
    #[builder(default = "DEFAULT_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// File name prefix of the generated document.
    #[builder(default = "DEFAULT_OUTPUT_PREFIX.to_string()")]
    pub output_prefix: String,

    /// Where working copies are written. Defaults to `<system temp>/evidoc`.
    #[builder(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Ignore dot-prefixed files and folders. Off by default, so a hidden
    /// subfolder still makes its parent a non-leaf.
    #[builder(default = "false")]
    pub skip_hidden: bool,

    /// Deepest subfolder nesting below the root that is still descended into.
    #[builder(default = "DEFAULT_MAX_DEPTH")]
    pub max_depth: usize,
}

impl EvidocConfig {
    /// Creates a new builder for configuring `EvidocConfig`.
    pub fn builder() -> EvidocConfigBuilder {
        EvidocConfigBuilder::default()
    }

    /// Validates the configuration and the source folder without touching its content.
    ///
    /// Every `generate*` method calls this before writing anything.
    pub fn preflight_check(&self) -> Result<&Self> {
        check_ranges(
            self.scale_factor,
            self.width_fit_ratio,
            self.max_image_dimension,
            self.jpeg_quality,
        )
        .map_err(Error::Other)?;
        if self.output_prefix.trim().is_empty() {
            return Err(Error::Other("Output prefix must not be empty".to_string()));
        }
        validate_source_dir(&self.source_path)?;
        Ok(self)
    }

    pub fn geometry(&self) -> PageGeometry {
        PageGeometry::from_preset(self.margin)
    }

    fn collector(&self) -> Collector {
        Collector::new(self.skip_hidden, self.max_depth)
    }

    fn assembler(&self) -> DocumentAssembler {
        DocumentAssembler::new(
            self.collector(),
            ImageNormalizer::new(
                self.max_image_dimension,
                self.jpeg_quality,
                scratch_dir(self.scratch_dir.as_deref()),
            ),
            PageFit::new(self.geometry(), self.scale_factor, self.width_fit_ratio),
        )
    }

    /// Runs only the scanner pre-pass and returns the discovered tree.
    ///
    /// Unreadable subfolders are reported and left out of the tree.
    pub async fn analyze_source<R>(&self, reporter: &mut R) -> Result<FolderNode>
    where
        R: Reporter + Send + ?Sized,
    {
        validate_source_dir(&self.source_path)?;
        reporter.info(0, EventKind::ScanStarted);
        self.collector()
            .scan_structure(&self.source_path, reporter)
            .await
            .ok_or_else(|| {
                Error::InvalidPath(
                    self.source_path.clone(),
                    "Source folder cannot be read.".to_string(),
                )
            })
    }

    /// Generates the DOCX document for the configured folder.
    ///
    /// Without a selected folder this returns [`Error::NoSourceSelected`] and
    /// leaves `log` untouched. Otherwise the log is cleared first and ends with
    /// a `RunFinished` event whatever the outcome.
    pub async fn generate(&self, log: &mut DiagnosticLog) -> Result<GenerationOutcome> {
        self.generate_with(Docx::new(self.geometry()), log).await
    }

    /// Like [`generate`](EvidocConfig::generate), writing through `builder`.
    pub async fn generate_with<B>(&self, builder: B, log: &mut DiagnosticLog) -> Result<GenerationOutcome>
    where
        B: DocumentBuilder,
    {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::NoSourceSelected);
        }

        log.clear();
        log.info(
            0,
            EventKind::RunStarted {
                source: self.source_path.clone(),
            },
        );

        let result = self.run(builder, log).await;
        if let Err(e) = &result {
            log.error(
                0,
                EventKind::RunFailed {
                    error: truncate_message(&e.to_string()),
                },
            );
        }
        log.info(0, EventKind::RunFinished);
        result
    }

    /// Runs [`generate`](EvidocConfig::generate) while holding `gate`.
    ///
    /// Fails with [`Error::RunInProgress`] if another run holds the gate; the
    /// gate is released when this returns.
    pub async fn generate_exclusive(
        &self,
        gate: &RunGate,
        log: &mut DiagnosticLog,
    ) -> Result<GenerationOutcome> {
        let _permit = gate.try_acquire()?;
        self.generate(log).await
    }

    async fn run<B>(&self, mut builder: B, log: &mut DiagnosticLog) -> Result<GenerationOutcome>
    where
        B: DocumentBuilder,
    {
        self.preflight_check()?;
        let root: &Path = &self.source_path;

        log.info(0, EventKind::ScanStarted);
        self.collector().scan_structure(root, log).await;

        log.info(0, EventKind::AssemblyStarted);
        let margin_cm = self.margin.margin_cm();
        builder.set_page_margins(margin_cm);
        log.info(0, EventKind::DocumentCreated { margin_cm });

        let title = display_name(root);
        builder.add_title(&title);
        log.info(0, EventKind::TitleAdded { title });

        let stats = self.assembler().assemble(&mut builder, root, log).await;

        let output_path = root.join(output_file_name(&self.output_prefix, Local::now()));
        builder.save(&output_path).await?;
        log.info(
            0,
            EventKind::DocumentSaved {
                path: output_path.clone(),
            },
        );

        Ok(GenerationOutcome { output_path, stats })
    }
}

fn check_ranges(
    scale_factor: f64,
    width_fit_ratio: f64,
    max_image_dimension: u32,
    jpeg_quality: u8,
) -> std::result::Result<(), String> {
    if !(scale_factor > 0.0 && scale_factor <= 1.0) {
        return Err(format!("Scale factor must be in (0, 1], got {}", scale_factor));
    }
    if !(width_fit_ratio > 0.0 && width_fit_ratio <= 1.0) {
        return Err(format!(
            "Width fit ratio must be in (0, 1], got {}",
            width_fit_ratio
        ));
    }
    if max_image_dimension == 0 {
        return Err("Maximum image dimension must be at least 1 pixel.".to_string());
    }
    if !(1..=100).contains(&jpeg_quality) {
        return Err(format!("JPEG quality must be between 1 and 100, got {}", jpeg_quality));
    }
    Ok(())
}

impl EvidocConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        check_ranges(
            self.scale_factor.unwrap_or(DEFAULT_SCALE_FACTOR),
            self.width_fit_ratio.unwrap_or(DEFAULT_WIDTH_FIT_RATIO),
            self.max_image_dimension.unwrap_or(DEFAULT_MAX_DIMENSION),
            self.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        )?;
        if let Some(prefix) = &self.output_prefix {
            if prefix.trim().is_empty() {
                return Err("Output prefix must not be empty.".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EvidocConfig::builder().build().unwrap();
        assert!(config.source_path.as_os_str().is_empty());
        assert_eq!(config.margin, MarginPreset::Narrow);
        assert_eq!(config.scale_factor, 0.9);
        assert_eq!(config.width_fit_ratio, 0.88);
        assert_eq!(config.max_image_dimension, 2000);
        assert_eq!(config.jpeg_quality, 95);
        assert_eq!(config.output_prefix, "佐证材料");
        assert!(!config.skip_hidden);
        assert_eq!(config.scratch_dir, None);
    }

    #[test]
    fn test_builder_rejects_out_of_range_values() {
        assert!(EvidocConfig::builder().scale_factor(0.0).build().is_err());
        assert!(EvidocConfig::builder().scale_factor(1.5).build().is_err());
        assert!(EvidocConfig::builder().width_fit_ratio(-0.1).build().is_err());
        assert!(EvidocConfig::builder().max_image_dimension(0u32).build().is_err());
        assert!(EvidocConfig::builder().jpeg_quality(0u8).build().is_err());
        assert!(EvidocConfig::builder().jpeg_quality(101u8).build().is_err());
        assert!(EvidocConfig::builder().output_prefix("  ").build().is_err());
        assert!(EvidocConfig::builder().scale_factor(1.0).build().is_ok());
    }

    #[test]
    fn test_preflight_requires_existing_directory() {
        let config = EvidocConfig::builder().build().unwrap();
        assert!(matches!(config.preflight_check(), Err(Error::NoSourceSelected)));

        let config = EvidocConfig::builder()
            .source_path("definitely/not/here/evidoc")
            .build()
            .unwrap();
        assert!(matches!(config.preflight_check(), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_generate_without_source_keeps_log() {
        let config = EvidocConfig::builder().build().unwrap();
        let mut log = DiagnosticLog::new();
        log.info(0, EventKind::ScanStarted);

        let result = config.generate(&mut log).await;
        assert!(matches!(result, Err(Error::NoSourceSelected)));
        assert_eq!(log.len(), 1);
    }
}
