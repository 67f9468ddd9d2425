//! Tone adjustment: Brightness, Contrast, Saturation.
//!
//! Each adjustment is an interpolation between the image and a "degenerate"
//! version of it:
//!
//! ```text
//! out = degenerate + factor * (pixel - degenerate)
//! ```
//!
//! | Adjustment | Degenerate image |
//! |------------|------------------|
//! | Brightness | black |
//! | Contrast | solid gray at the mean luma of the image |
//! | Saturation | per-pixel luma |
//!
//! A factor of 1.0 is the identity, values below 1.0 move toward the
//! degenerate image and values above 1.0 extrapolate away from it. Results
//! are clipped and truncated to 0-255.

use ndarray::{Array3, ArrayView3};

use super::core::{ensure_rgb, luma_601, truncate_u8};
use crate::error::Result;
use crate::params::{BRIGHTNESS_RANGE, CONTRAST_RANGE, SATURATION_RANGE};

#[inline]
fn lerp(degenerate: f64, pixel: u8, factor: f64) -> u8 {
    truncate_u8(degenerate + factor * (pixel as f64 - degenerate))
}

// ============================================================================
// Brightness
// ============================================================================

/// Scale every channel by `factor`.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `factor` - 0.5-1.5, 1.0 = no change
pub fn brightness_u8(input: ArrayView3<u8>, factor: f64) -> Result<Array3<u8>> {
    ensure_rgb(&input)?;
    BRIGHTNESS_RANGE.check("brightness", factor)?;
    if factor == 1.0 {
        return Ok(input.to_owned());
    }
    Ok(input.mapv(|v| lerp(0.0, v, factor)))
}

// ============================================================================
// Contrast
// ============================================================================

/// Mean luma of the image, rounded to an integer level.
pub fn mean_luma(input: &ArrayView3<u8>) -> f64 {
    let (height, width, _) = input.dim();
    let mut sum = 0u64;
    for y in 0..height {
        for x in 0..width {
            sum += luma_601(input[[y, x, 0]], input[[y, x, 1]], input[[y, x, 2]]) as u64;
        }
    }
    let mean = sum as f64 / (height * width) as f64;
    (mean + 0.5).floor()
}

/// Scale each channel's deviation from the image's mean gray by `factor`.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `factor` - 0.5-1.5, 1.0 = no change
pub fn contrast_u8(input: ArrayView3<u8>, factor: f64) -> Result<Array3<u8>> {
    ensure_rgb(&input)?;
    CONTRAST_RANGE.check("contrast", factor)?;
    if factor == 1.0 {
        return Ok(input.to_owned());
    }
    let mean = mean_luma(&input);
    Ok(input.mapv(|v| lerp(mean, v, factor)))
}

// ============================================================================
// Saturation
// ============================================================================

/// Scale each pixel's deviation from its own gray value by `factor`.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `factor` - 0.0 (grayscale) to 2.0 (vivid), 1.0 = no change
pub fn saturation_u8(input: ArrayView3<u8>, factor: f64) -> Result<Array3<u8>> {
    let (height, width) = ensure_rgb(&input)?;
    SATURATION_RANGE.check("saturation", factor)?;
    if factor == 1.0 {
        return Ok(input.to_owned());
    }

    let mut output = Array3::<u8>::zeros((height, width, 3));
    for y in 0..height {
        for x in 0..width {
            let r = input[[y, x, 0]];
            let g = input[[y, x, 1]];
            let b = input[[y, x, 2]];
            let gray = luma_601(r, g, b) as f64;

            output[[y, x, 0]] = lerp(gray, r, factor);
            output[[y, x, 1]] = lerp(gray, g, factor);
            output[[y, x, 2]] = lerp(gray, b, factor);
        }
    }
    Ok(output)
}

// ============================================================================
// Combined
// ============================================================================

/// Brightness, then contrast, then saturation. Factors equal to 1.0 are
/// skipped.
pub fn adjust_tone_u8(
    input: ArrayView3<u8>,
    brightness: f64,
    contrast: f64,
    saturation: f64,
) -> Result<Array3<u8>> {
    let mut output = brightness_u8(input, brightness)?;
    if contrast != 1.0 {
        output = contrast_u8(output.view(), contrast)?;
    }
    if saturation != 1.0 {
        output = saturation_u8(output.view(), saturation)?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone() -> Array3<u8> {
        let mut img = Array3::<u8>::zeros((2, 2, 3));
        for y in 0..2 {
            for x in 0..2 {
                let v = if x == 0 { 50 } else { 150 };
                for c in 0..3 {
                    img[[y, x, c]] = v;
                }
            }
        }
        img
    }

    #[test]
    fn test_brightness_scales() {
        let img = Array3::<u8>::from_elem((2, 2, 3), 100);
        let result = brightness_u8(img.view(), 1.5).unwrap();
        assert_eq!(result[[0, 0, 0]], 150);

        let result = brightness_u8(img.view(), 0.5).unwrap();
        assert_eq!(result[[1, 1, 2]], 50);
    }

    #[test]
    fn test_brightness_clips() {
        let img = Array3::<u8>::from_elem((1, 1, 3), 200);
        let result = brightness_u8(img.view(), 1.5).unwrap();
        assert_eq!(result[[0, 0, 0]], 255);
    }

    #[test]
    fn test_contrast_around_mean() {
        let img = two_tone();
        assert_eq!(mean_luma(&img.view()), 100.0);

        let result = contrast_u8(img.view(), 1.5).unwrap();
        assert_eq!(result[[0, 0, 0]], 25);
        assert_eq!(result[[0, 1, 0]], 175);

        let result = contrast_u8(img.view(), 0.5).unwrap();
        assert_eq!(result[[0, 0, 0]], 75);
        assert_eq!(result[[0, 1, 0]], 125);
    }

    #[test]
    fn test_saturation_zero_is_grayscale() {
        let mut img = Array3::<u8>::zeros((1, 1, 3));
        img[[0, 0, 0]] = 255;
        let result = saturation_u8(img.view(), 0.0).unwrap();
        assert_eq!(result[[0, 0, 0]], 76);
        assert_eq!(result[[0, 0, 1]], 76);
        assert_eq!(result[[0, 0, 2]], 76);
    }

    #[test]
    fn test_saturation_boost_spreads_channels() {
        let mut img = Array3::<u8>::zeros((1, 1, 3));
        img[[0, 0, 0]] = 180;
        img[[0, 0, 1]] = 100;
        img[[0, 0, 2]] = 100;
        let result = saturation_u8(img.view(), 2.0).unwrap();
        let spread_before = 180 - 100;
        let spread_after = result[[0, 0, 0]] as i32 - result[[0, 0, 1]] as i32;
        assert!(spread_after > spread_before);
    }

    #[test]
    fn test_factors_outside_range_rejected() {
        let img = two_tone();
        assert!(brightness_u8(img.view(), 1.6).is_err());
        assert!(contrast_u8(img.view(), f64::INFINITY).is_err());
        assert!(saturation_u8(img.view(), -0.5).is_err());
        // The identity shortcut does not bypass the later checks
        assert!(adjust_tone_u8(img.view(), 1.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_neutral_factors_are_identity() {
        let mut img = two_tone();
        img[[1, 0, 2]] = 3;
        let result = adjust_tone_u8(img.view(), 1.0, 1.0, 1.0).unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn test_order_brightness_before_contrast() {
        let img = two_tone();
        // Brightness 0.5 -> 25/75, mean 50; contrast 1.5 -> 12/87
        let result = adjust_tone_u8(img.view(), 0.5, 1.5, 1.0).unwrap();
        assert_eq!(result[[0, 0, 0]], 12);
        assert_eq!(result[[0, 1, 0]], 87);
    }
}
