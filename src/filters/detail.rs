//! Detail filter: unsharp-mask sharpening or Gaussian softening.
//!
//! A single signed `sharpness` control drives both directions:
//!
//! | sharpness | effect |
//! |-----------|--------|
//! | > 0 | extrapolate away from a Gaussian blur, sigma = max(0.5, 1.5 - 0.1 s) |
//! | < 0 | Gaussian blur, sigma = 0.8 \|s\| + 0.5 |
//! | 0 | identity |

use ndarray::{Array3, ArrayView3, Zip};

use super::core::{ensure_rgb, gaussian_blur_u8};
use crate::error::Result;
use crate::params::SHARPNESS_RANGE;

/// Blurs narrower than this are indistinguishable from the input.
const MIN_BLUR_SIGMA: f64 = 0.3;

/// Blur sigma used as the unsharp-mask reference for a positive sharpness.
pub fn sharpen_sigma(sharpness: f64) -> f64 {
    (1.5 - sharpness * 0.1).max(0.5)
}

/// Weight of the original image in the unsharp-mask blend.
pub fn sharpen_factor(sharpness: f64) -> f64 {
    1.0 + sharpness * 0.3
}

/// Blur sigma used for a negative sharpness.
pub fn soften_sigma(sharpness: f64) -> f64 {
    sharpness.abs() * 0.8 + 0.5
}

/// Weighted sum `a * alpha + b * beta`, rounded and saturated to u8.
fn add_weighted(a: ArrayView3<u8>, alpha: f64, b: ArrayView3<u8>, beta: f64) -> Array3<u8> {
    let mut output = Array3::<u8>::zeros(a.raw_dim());
    Zip::from(&mut output)
        .and(&a)
        .and(&b)
        .for_each(|o, &va, &vb| {
            let v = va as f64 * alpha + vb as f64 * beta;
            *o = v.round().clamp(0.0, 255.0) as u8;
        });
    output
}

/// Apply the detail filter - u8 version.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `sharpness` - -5.0 (soft) to 5.0 (crisp), 0.0 = no change
///
/// # Returns
/// Filtered image with same dimensions, or `InvalidParameter` when
/// `sharpness` is outside -5.0 to 5.0
pub fn detail_u8(input: ArrayView3<u8>, sharpness: f64) -> Result<Array3<u8>> {
    ensure_rgb(&input)?;
    SHARPNESS_RANGE.check("sharpness", sharpness)?;

    if sharpness > 0.0 {
        let blurred = gaussian_blur_u8(input, sharpen_sigma(sharpness))?;
        let factor = sharpen_factor(sharpness);
        Ok(add_weighted(input, factor, blurred.view(), 1.0 - factor))
    } else if sharpness < 0.0 {
        let sigma = soften_sigma(sharpness);
        if sigma > MIN_BLUR_SIGMA {
            gaussian_blur_u8(input, sigma)
        } else {
            Ok(input.to_owned())
        }
    } else {
        Ok(input.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CorrectionError;
    use approx::assert_relative_eq;

    /// Sum of squared horizontal and vertical neighbor differences.
    fn edge_energy(img: &Array3<u8>) -> f64 {
        let (h, w, c) = img.dim();
        let mut energy = 0.0;
        for y in 0..h {
            for x in 0..w {
                for ch in 0..c {
                    let v = img[[y, x, ch]] as f64;
                    if x + 1 < w {
                        energy += (img[[y, x + 1, ch]] as f64 - v).powi(2);
                    }
                    if y + 1 < h {
                        energy += (img[[y + 1, x, ch]] as f64 - v).powi(2);
                    }
                }
            }
        }
        energy
    }

    fn soft_square() -> Array3<u8> {
        let mut img = Array3::<u8>::from_elem((24, 24, 3), 80);
        for y in 8..16 {
            for x in 8..16 {
                for c in 0..3 {
                    img[[y, x, c]] = 170;
                }
            }
        }
        img
    }

    #[test]
    fn test_parameter_curves() {
        assert_relative_eq!(sharpen_sigma(2.0), 1.3, epsilon = 1e-6);
        assert_relative_eq!(sharpen_sigma(5.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(sharpen_factor(2.0), 1.6, epsilon = 1e-6);
        assert_relative_eq!(soften_sigma(-2.0), 2.1, epsilon = 1e-6);
        assert_relative_eq!(soften_sigma(-0.1), 0.58, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_is_identity() {
        let img = soft_square();
        assert_eq!(detail_u8(img.view(), 0.0).unwrap(), img);
    }

    #[test]
    fn test_sharpen_and_blur_move_edge_energy_apart() {
        let img = soft_square();
        let base = edge_energy(&img);

        let sharpened = detail_u8(img.view(), 2.0).unwrap();
        let blurred = detail_u8(img.view(), -2.0).unwrap();

        assert!(edge_energy(&sharpened) > base);
        assert!(edge_energy(&blurred) < base);
        assert_ne!(sharpened, blurred);
    }

    #[test]
    fn test_sharpen_overshoots_at_edge() {
        let img = soft_square();
        let result = detail_u8(img.view(), 3.0).unwrap();
        // Bright side of the edge gets brighter, dark side darker
        assert!(result[[12, 8, 0]] > 170);
        assert!(result[[12, 7, 0]] < 80);
        // Flat interior far from edges is untouched
        assert_eq!(result[[12, 1, 0]], 80);
    }

    #[test]
    fn test_unbounded_sharpness_rejected() {
        let img = soft_square();
        for sharpness in [f64::NEG_INFINITY, f64::INFINITY, f64::NAN, -1e9, 5.5] {
            assert!(
                matches!(
                    detail_u8(img.view(), sharpness),
                    Err(CorrectionError::InvalidParameter { name: "sharpness", .. })
                ),
                "sharpness {}",
                sharpness
            );
        }
    }

    #[test]
    fn test_flat_image_unchanged_by_either_direction() {
        let img = Array3::<u8>::from_elem((10, 10, 3), 140);
        assert_eq!(detail_u8(img.view(), 4.0).unwrap(), img);
        assert_eq!(detail_u8(img.view(), -4.0).unwrap(), img);
    }
}
