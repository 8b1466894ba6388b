//! Raster helpers shared by the image extractors

use crate::error::ScreeningError;
use image::imageops::FilterType;
use image::DynamicImage;

/// Decode an encoded raster (PNG, JPEG, GIF) into an image
pub(crate) fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ScreeningError> {
    if bytes.is_empty() {
        return Err(ScreeningError::InvalidInput("Empty image data".to_string()));
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| ScreeningError::InvalidInput(format!("Cannot decode image: {e}")))?;
    ensure_non_empty(&image)?;
    Ok(image)
}

pub(crate) fn ensure_non_empty(image: &DynamicImage) -> Result<(), ScreeningError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ScreeningError::InvalidInput(
            "Image has no pixels".to_string(),
        ));
    }
    Ok(())
}

/// Square grayscale grid with intensities in [0, 1]
pub(crate) struct GrayGrid {
    size: usize,
    data: Vec<f64>,
}

impl GrayGrid {
    /// Convert to grayscale and resample to `size` x `size`
    pub(crate) fn from_image(image: &DynamicImage, size: u32) -> Self {
        let gray = image.to_luma8();
        let resized = image::imageops::resize(&gray, size, size, FilterType::Triangle);
        let data = resized
            .into_raw()
            .into_iter()
            .map(|p| p as f64 / 255.0)
            .collect();

        Self {
            size: size as usize,
            data,
        }
    }

    pub(crate) fn values(&self) -> &[f64] {
        &self.data
    }

    fn at(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.size + x]
    }

    /// Sobel derivatives for every interior pixel
    pub(crate) fn sobel(&self) -> Gradient {
        let n = self.size;
        if n < 3 {
            return Gradient::default();
        }

        let inner = n - 2;
        let mut gradient = Gradient {
            size: inner,
            gx: Vec::with_capacity(inner * inner),
            gy: Vec::with_capacity(inner * inner),
        };
        for y in 1..n - 1 {
            for x in 1..n - 1 {
                gradient.gx.push(
                    (self.at(x + 1, y - 1) + 2.0 * self.at(x + 1, y) + self.at(x + 1, y + 1))
                        - (self.at(x - 1, y - 1) + 2.0 * self.at(x - 1, y) + self.at(x - 1, y + 1)),
                );
                gradient.gy.push(
                    (self.at(x - 1, y + 1) + 2.0 * self.at(x, y + 1) + self.at(x + 1, y + 1))
                        - (self.at(x - 1, y - 1) + 2.0 * self.at(x, y - 1) + self.at(x + 1, y - 1)),
                );
            }
        }
        gradient
    }

    /// 4-neighbour Laplacian response for every interior pixel
    pub(crate) fn laplacian(&self) -> Vec<f64> {
        let n = self.size;
        if n < 3 {
            return Vec::new();
        }

        let mut out = Vec::with_capacity((n - 2) * (n - 2));
        for y in 1..n - 1 {
            for x in 1..n - 1 {
                let response = self.at(x - 1, y) + self.at(x + 1, y) + self.at(x, y - 1)
                    + self.at(x, y + 1)
                    - 4.0 * self.at(x, y);
                out.push(response);
            }
        }
        out
    }
}

/// Horizontal and vertical Sobel derivatives on a square grid
#[derive(Debug, Default)]
pub(crate) struct Gradient {
    size: usize,
    gx: Vec<f64>,
    gy: Vec<f64>,
}

impl Gradient {
    pub(crate) fn magnitude(&self) -> Vec<f64> {
        self.gx
            .iter()
            .zip(&self.gy)
            .map(|(gx, gy)| (gx * gx + gy * gy).sqrt())
            .collect()
    }

    /// Mean of `1 - coherence` of the structure tensor summed over a
    /// `(2 * radius + 1)` square window, taken at every pixel whose magnitude
    /// exceeds `threshold` and whose window fits inside the grid.
    ///
    /// A straight or gently curving stroke scores near 0; a stroke whose
    /// direction keeps changing within the window scores higher. Returns 0 when
    /// no pixel qualifies.
    pub(crate) fn orientation_incoherence(&self, threshold: f64, radius: usize) -> f64 {
        let n = self.size;
        if n <= 2 * radius {
            return 0.0;
        }

        let mut total = 0.0;
        let mut count = 0usize;
        for y in radius..n - radius {
            for x in radius..n - radius {
                let (gx, gy) = (self.gx[y * n + x], self.gy[y * n + x]);
                if (gx * gx + gy * gy).sqrt() <= threshold {
                    continue;
                }

                let (mut jxx, mut jyy, mut jxy) = (0.0, 0.0, 0.0);
                for wy in y - radius..=y + radius {
                    for wx in x - radius..=x + radius {
                        let (a, b) = (self.gx[wy * n + wx], self.gy[wy * n + wx]);
                        jxx += a * a;
                        jyy += b * b;
                        jxy += a * b;
                    }
                }
                let trace = jxx + jyy;
                if trace <= 0.0 {
                    continue;
                }
                let coherence = ((jxx - jyy).powi(2) + 4.0 * jxy * jxy).sqrt() / trace;
                total += 1.0 - coherence;
                count += 1;
            }
        }

        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }
}

/// Mean and population variance; (0, 0) for an empty slice
pub(crate) fn mean_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn grid_from(image: GrayImage) -> GrayGrid {
        let size = image.width();
        GrayGrid::from_image(&DynamicImage::ImageLuma8(image), size)
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let grid = grid_from(GrayImage::from_pixel(16, 16, Luma([200u8])));

        assert!(grid.sobel().magnitude().iter().all(|m| m.abs() < 1e-9));
        assert!(grid.laplacian().iter().all(|l| l.abs() < 1e-9));
    }

    #[test]
    fn test_vertical_step_gives_sobel_four() {
        let image = GrayImage::from_fn(8, 8, |x, _| if x < 4 { Luma([0u8]) } else { Luma([255u8]) });
        let grid = grid_from(image);
        let magnitude = grid.sobel().magnitude();

        let max = magnitude.iter().cloned().fold(0.0, f64::max);
        assert!((max - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_straight_edge_is_coherent() {
        let image = GrayImage::from_fn(16, 16, |x, _| if x < 8 { Luma([0u8]) } else { Luma([255u8]) });
        let gradient = grid_from(image).sobel();

        assert!(gradient.orientation_incoherence(0.1, 2) < 1e-9);
    }

    #[test]
    fn test_isolated_dot_is_incoherent() {
        let image = GrayImage::from_fn(16, 16, |x, y| {
            if (7..9).contains(&x) && (7..9).contains(&y) {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });
        let gradient = grid_from(image).sobel();

        assert!(gradient.orientation_incoherence(0.1, 2) > 0.5);
    }

    #[test]
    fn test_incoherence_without_edges_is_zero() {
        let gradient = grid_from(GrayImage::from_pixel(16, 16, Luma([90u8]))).sobel();

        assert_eq!(gradient.orientation_incoherence(0.1, 2), 0.0);
    }

    #[test]
    fn test_mean_variance() {
        let (mean, variance) = mean_variance(&[0.0, 1.0, 0.0, 1.0]);
        assert!((mean - 0.5).abs() < 1e-12);
        assert!((variance - 0.25).abs() < 1e-12);
        assert_eq!(mean_variance(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_image(b"definitely not a png"),
            Err(ScreeningError::InvalidInput(_))
        ));
        assert!(matches!(decode_image(&[]), Err(ScreeningError::InvalidInput(_))));
    }
}
