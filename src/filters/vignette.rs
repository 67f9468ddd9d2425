//! Vignette: radial darkening toward the corners.
//!
//! ```text
//! mask(x, y) = clip(1 - strength * (d / d_max)², 0, 1)
//! ```
//!
//! where `d` is the distance from `(x, y)` to the image center
//! `(width / 2, height / 2)` and `d_max` the distance from the center to a
//! corner. The same mask is applied to all three channels.

use ndarray::{Array2, Array3, ArrayView3};

use super::core::ensure_rgb;
use crate::error::Result;
use crate::params::VIGNETTE_RANGE;

/// Build the per-pixel vignette mask.
///
/// # Arguments
/// * `height`, `width` - Mask dimensions
/// * `strength` - Darkening at the corners (0.0-0.8)
pub fn vignette_mask(height: usize, width: usize, strength: f64) -> Array2<f64> {
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt();

    Array2::from_shape_fn((height, width), |(y, x)| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let norm = (dx * dx + dy * dy).sqrt() / max_dist;
        (1.0 - strength * norm * norm).clamp(0.0, 1.0)
    })
}

/// Apply vignette - u8 version.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `strength` - 0.0-0.8, 0.0 = no change
///
/// # Returns
/// Darkened image with same dimensions
pub fn vignette_u8(input: ArrayView3<u8>, strength: f64) -> Result<Array3<u8>> {
    let (height, width) = ensure_rgb(&input)?;
    VIGNETTE_RANGE.check("vignette_strength", strength)?;
    if strength <= 0.0 {
        return Ok(input.to_owned());
    }

    let mask = vignette_mask(height, width, strength);
    let mut output = Array3::<u8>::zeros((height, width, 3));

    for y in 0..height {
        for x in 0..width {
            let m = mask[[y, x]];
            for c in 0..3 {
                output[[y, x, c]] = (input[[y, x, c]] as f64 * m).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Ok(output)
}
