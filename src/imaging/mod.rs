//! Image preparation: turning arbitrary source images into embed-ready working
//! copies, and deciding how large they appear on the page.

pub mod layout;
pub mod normalizer;

pub use layout::{
    DEFAULT_MAX_DIMENSION, DEFAULT_SCALE_FACTOR, DEFAULT_WIDTH_FIT_RATIO, PageFit,
    downsample_dimensions,
};
pub use normalizer::{DEFAULT_JPEG_QUALITY, ImageNormalizer, NormalizedImage, TempArtifact};
