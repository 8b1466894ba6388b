//! Spiral drawing feature extraction
//!
//! Derives five bounded indices from a photographed spiral:
//! - Tremor: how often the stroke changes direction locally (structure tensor
//!   incoherence of the Sobel gradients along edges)
//! - Irregularity: coefficient of variation of stroke edge strength
//! - Pressure: intensity variance (line thickness consistency)
//! - Speed: inverse of total edge energy (dense edges = slow, deliberate strokes)
//! - Smoothness: inverse of mean Laplacian response

use crate::config::SpiralConfig;
use crate::error::ScreeningError;
use crate::extractors::imaging::{decode_image, ensure_non_empty, mean_variance, GrayGrid};
use crate::types::SpiralFeatures;
use image::DynamicImage;

/// Intensity variance below which the image is treated as blank
const BLANK_VARIANCE: f64 = 1e-9;

/// Extractor for spiral drawing images
#[derive(Debug, Clone, Default)]
pub struct SpiralExtractor {
    config: SpiralConfig,
}

impl SpiralExtractor {
    pub fn new(config: SpiralConfig) -> Self {
        Self { config }
    }

    /// Decode an encoded image and extract spiral features
    pub fn extract(&self, bytes: &[u8]) -> Result<SpiralFeatures, ScreeningError> {
        let image = decode_image(bytes)?;
        self.extract_image(&image)
    }

    /// Extract spiral features from an already-decoded image
    pub fn extract_image(&self, image: &DynamicImage) -> Result<SpiralFeatures, ScreeningError> {
        ensure_non_empty(image)?;
        log::debug!(
            "Extracting spiral features from {}x{} image",
            image.width(),
            image.height()
        );

        let grid = GrayGrid::from_image(image, self.config.resolution);
        let (_, intensity_variance) = mean_variance(grid.values());

        if intensity_variance < BLANK_VARIANCE {
            log::warn!("Spiral image has no intensity variation; using degenerate features");
            return Ok(SpiralFeatures::degenerate());
        }

        let gradient = grid.sobel();
        let incoherence =
            gradient.orientation_incoherence(self.config.edge_threshold, self.config.orientation_radius);
        let tremor = clamp01(incoherence / self.config.tremor_norm);

        let magnitude = gradient.magnitude();

        let irregularity = clamp01(
            edge_variation(&magnitude, self.config.edge_threshold) / self.config.irregularity_norm,
        );

        let edge_energy = mean_square(&magnitude);
        let speed = clamp01(1.0 - edge_energy / self.config.speed_norm);

        let laplacian = grid.laplacian();
        let roughness = mean_abs(&laplacian);
        let smoothness = clamp01(1.0 - roughness / self.config.smoothness_norm);

        let pressure = clamp01(intensity_variance / self.config.pressure_norm);

        log::debug!(
            "Spiral stats: incoherence {:.4}, edge energy {:.4}, laplacian {:.4}, variance {:.4}",
            incoherence,
            edge_energy,
            roughness,
            intensity_variance
        );

        Ok(SpiralFeatures {
            tremor,
            irregularity,
            pressure,
            speed,
            smoothness,
            quality_flags: Vec::new(),
        })
    }
}

/// Coefficient of variation of gradient magnitude over edge pixels
fn edge_variation(magnitude: &[f64], threshold: f64) -> f64 {
    let edges: Vec<f64> = magnitude.iter().copied().filter(|m| *m > threshold).collect();
    if edges.len() < 2 {
        return 0.0;
    }
    let (mean, variance) = mean_variance(&edges);
    if mean <= 0.0 {
        return 0.0;
    }
    variance.sqrt() / mean
}

fn mean_square(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64
}

fn mean_abs(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
}

fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{encode_png, spiral_image};
    use crate::types::QualityFlag;
    use image::{GrayImage, Luma};
    use pretty_assertions::assert_eq;

    fn all_bounded(features: &SpiralFeatures) -> bool {
        features
            .named_values()
            .iter()
            .all(|(_, v)| (0.0..=1.0).contains(v))
    }

    #[test]
    fn test_identical_images_give_identical_features() {
        let extractor = SpiralExtractor::default();
        let png = encode_png(&spiral_image(300, 4.0, 0.0)).unwrap();
        let copy = png.clone();

        let first = extractor.extract(&png).unwrap();
        let second = extractor.extract(&copy).unwrap();

        assert_eq!(first, second);
        assert!(all_bounded(&first));
        assert!(first.quality_flags.is_empty());
    }

    #[test]
    fn test_blank_image_is_degenerate_not_error() {
        let extractor = SpiralExtractor::default();
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([255u8])));

        let features = extractor.extract_image(&blank).unwrap();

        assert_eq!(features, SpiralFeatures::degenerate());
        assert!(features.quality_flags.contains(&QualityFlag::DegenerateSignal));
    }

    #[test]
    fn test_undecodable_bytes_are_invalid_input() {
        let extractor = SpiralExtractor::default();
        let result = extractor.extract(&[0x89, 0x50, 0x4e, 0x47, 0x00, 0x01]);

        assert!(matches!(result, Err(ScreeningError::InvalidInput(_))));
    }

    #[test]
    fn test_checkerboard_is_rough() {
        let extractor = SpiralExtractor::default();
        let board = GrayImage::from_fn(224, 224, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });
        let rough = extractor
            .extract_image(&DynamicImage::ImageLuma8(board))
            .unwrap();
        let clean = extractor.extract_image(&spiral_image(224, 4.0, 0.0)).unwrap();

        assert!(rough.smoothness < 0.1);
        assert!(clean.smoothness > 0.5);
    }

    #[test]
    fn test_wobble_raises_tremor_and_lowers_smoothness() {
        let extractor = SpiralExtractor::default();
        for (size, turns) in [(224, 4.0), (320, 5.0)] {
            let features: Vec<SpiralFeatures> = [0.0, 3.0, 8.0]
                .iter()
                .map(|w| extractor.extract_image(&spiral_image(size, turns, *w)).unwrap())
                .collect();

            for pair in features.windows(2) {
                assert!(pair[1].tremor > pair[0].tremor, "size {size}: {pair:?}");
                assert!(pair[1].smoothness < pair[0].smoothness, "size {size}: {pair:?}");
            }
            assert!(features[0].tremor < 0.2);
            assert!(features[2].tremor > 0.4);
        }
    }

    #[test]
    fn test_half_black_image_saturates_pressure() {
        let extractor = SpiralExtractor::default();
        let half = GrayImage::from_fn(224, 224, |x, _| {
            if x < 112 {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });

        let features = extractor
            .extract_image(&DynamicImage::ImageLuma8(half))
            .unwrap();

        assert!(features.pressure > 0.9);
        assert!(all_bounded(&features));
    }

    #[test]
    fn test_arbitrary_input_size_is_normalized() {
        let extractor = SpiralExtractor::default();
        let small = extractor.extract_image(&spiral_image(120, 3.0, 0.0)).unwrap();
        let large = extractor.extract_image(&spiral_image(640, 3.0, 0.0)).unwrap();

        assert!(all_bounded(&small));
        assert!(all_bounded(&large));
    }
}
