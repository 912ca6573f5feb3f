//! Pure sizing calculations: pixel downsampling and page-fit embed sizes.

use crate::types::{EmbedSize, Orientation, PageGeometry};

/// Fraction of the usable page an image may occupy.
pub const DEFAULT_SCALE_FACTOR: f64 = 0.9;
/// Extra width reduction for landscape images.
pub const DEFAULT_WIDTH_FIT_RATIO: f64 = 0.88;
/// Longest side, in pixels, kept for embedded images.
pub const DEFAULT_MAX_DIMENSION: u32 = 2000;

/// Dimensions after capping the longer side at `max_dimension`, preserving
/// aspect ratio. `None` if the image already fits.
///
/// The shorter side is truncated, never below one pixel.
pub fn downsample_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dimension || max_dimension == 0 {
        return None;
    }
    let ratio = max_dimension as f64 / longest as f64;
    let scale = |side: u32| -> u32 {
        if side == longest {
            max_dimension
        } else {
            ((side as f64 * ratio) as u32).max(1)
        }
    };
    Some((scale(width), scale(height)))
}

/// Computes how an image is constrained on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFit {
    geometry: PageGeometry,
    scale_factor: f64,
    width_fit_ratio: f64,
}

impl PageFit {
    pub fn new(geometry: PageGeometry, scale_factor: f64, width_fit_ratio: f64) -> Self {
        Self {
            geometry,
            scale_factor,
            width_fit_ratio,
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    /// Portrait images are height-limited; landscape and square ones width-limited.
    pub fn embed_size(&self, orientation: Orientation) -> EmbedSize {
        match orientation {
            Orientation::Portrait => {
                EmbedSize::HeightCm(self.geometry.usable_height_cm() * self.scale_factor)
            }
            Orientation::Landscape => EmbedSize::WidthCm(
                self.geometry.usable_width_cm() * self.width_fit_ratio * self.scale_factor,
            ),
        }
    }
}

impl From<PageGeometry> for PageFit {
    fn from(geometry: PageGeometry) -> Self {
        Self::new(geometry, DEFAULT_SCALE_FACTOR, DEFAULT_WIDTH_FIT_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarginPreset;

    #[test]
    fn test_downsample_wide_image() {
        assert_eq!(downsample_dimensions(4000, 1000, 2000), Some((2000, 500)));
        assert_eq!(downsample_dimensions(3001, 1000, 2000), Some((2000, 666)));
        assert_eq!(downsample_dimensions(100_000, 1, 2000), Some((2000, 1)));
    }

    #[test]
    fn test_downsample_tall_image() {
        assert_eq!(downsample_dimensions(1000, 4000, 2000), Some((500, 2000)));
        assert_eq!(downsample_dimensions(1, 100_000, 2000), Some((1, 2000)));
    }

    #[test]
    fn test_downsample_keeps_small_images() {
        assert_eq!(downsample_dimensions(1000, 1999, 2000), None);
        assert_eq!(downsample_dimensions(2000, 2000, 2000), None);
        assert_eq!(downsample_dimensions(1999, 10, 2000), None);
        assert_eq!(downsample_dimensions(2001, 2001, 2000), Some((2000, 2000)));
    }

    #[test]
    fn test_landscape_is_width_limited() {
        let geometry = PageGeometry::from_preset(MarginPreset::Narrow);
        let fit = PageFit::from(geometry);
        match fit.embed_size(Orientation::Landscape) {
            EmbedSize::WidthCm(w) => assert!((w - 18.46 * 0.88 * 0.9).abs() < 1e-9),
            other => panic!("expected width constraint, got {:?}", other),
        }
    }

    #[test]
    fn test_portrait_is_height_limited() {
        let geometry = PageGeometry::from_preset(MarginPreset::Normal);
        let fit = PageFit::new(geometry, 0.5, 1.0);
        match fit.embed_size(Orientation::Portrait) {
            EmbedSize::HeightCm(h) => assert!((h - (29.7 - 5.08 - 1.0) * 0.5).abs() < 1e-9),
            other => panic!("expected height constraint, got {:?}", other),
        }
    }
}
