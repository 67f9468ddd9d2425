//! Chromatic aberration: lateral color fringing.
//!
//! The red plane is shifted left and the blue plane right by the same number
//! of pixels; green stays in place. The shifted image is then blended at 30%
//! over the original so the fringe stays subtle.
//!
//! Columns uncovered by a shift repeat the nearest edge column of the
//! original plane (clamp), they do not wrap around.

use ndarray::{Array3, ArrayView3};

use super::core::{ensure_rgb, truncate_u8};
use crate::error::Result;
use crate::params::CHROMATIC_ABERRATION_RANGE;

/// Opacity of the shifted image in the final blend.
pub const ABERRATION_BLEND_ALPHA: f64 = 0.3;

/// Horizontal shift in pixels for a given strength and image size.
///
/// `max(1, round(strength * min(height, width) * 0.002))`
pub fn aberration_offset(strength: f64, height: usize, width: usize) -> usize {
    let offset = (strength * height.min(width) as f64 * 0.002).round();
    (offset as usize).max(1)
}

/// Apply chromatic aberration - u8 version.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `strength` - 0.0-5.0, 0.0 = no change
///
/// # Returns
/// Image with same dimensions; the green channel equals the input's
pub fn chromatic_aberration_u8(input: ArrayView3<u8>, strength: f64) -> Result<Array3<u8>> {
    let (height, width) = ensure_rgb(&input)?;
    CHROMATIC_ABERRATION_RANGE.check("chromatic_aberration", strength)?;
    if strength <= 0.0 {
        return Ok(input.to_owned());
    }

    let offset = aberration_offset(strength, height, width) as isize;
    let last = width as isize - 1;
    let mut output = Array3::<u8>::zeros((height, width, 3));

    for y in 0..height {
        for x in 0..width {
            // Red moves left: pixel x shows what was at x + offset
            let rx = (x as isize + offset).clamp(0, last) as usize;
            // Blue moves right: pixel x shows what was at x - offset
            let bx = (x as isize - offset).clamp(0, last) as usize;

            let shifted = [input[[y, rx, 0]], input[[y, x, 1]], input[[y, bx, 2]]];
            for c in 0..3 {
                let orig = input[[y, x, c]] as f64;
                let v = orig + ABERRATION_BLEND_ALPHA * (shifted[c] as f64 - orig);
                output[[y, x, c]] = truncate_u8(v);
            }
        }
    }

    Ok(output)
}
