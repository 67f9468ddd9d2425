//! Core utilities shared by the correction filters.
//!
//! - Input validation for RGB rasters
//! - Gaussian kernel generation and separable blur
//! - Border index mapping
//! - Luma conversion

use ndarray::{Array3, ArrayView3};

use crate::error::{CorrectionError, Result};

/// Check that `input` is a non-empty (H, W, 3) raster.
///
/// # Returns
/// `(height, width)` of the image
pub fn ensure_rgb<T>(input: &ArrayView3<T>) -> Result<(usize, usize)> {
    let (height, width, channels) = input.dim();
    if channels != 3 {
        return Err(CorrectionError::UnsupportedChannels(channels));
    }
    if height == 0 || width == 0 {
        return Err(CorrectionError::EmptyImage { height, width });
    }
    Ok((height, width))
}

/// Map an out-of-range index back into `0..len` by mirroring around the
/// edge pixels without repeating them (`gfedcb|abcdefgh|gfedcba`).
#[inline]
pub fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let n = len as isize;
    let period = 2 * (n - 1);
    let i = index.rem_euclid(period);
    if i >= n {
        (period - i) as usize
    } else {
        i as usize
    }
}

/// Largest Gaussian sigma accepted by the blur helpers.
pub const MAX_BLUR_SIGMA: f64 = 1024.0;

/// Generate a normalized 1D Gaussian kernel for 8-bit images.
///
/// Kernel size is `round(6 * sigma + 1)`, forced odd. A non-positive sigma
/// gives the identity kernel `[1.0]`.
///
/// # Arguments
/// * `sigma` - Standard deviation of the Gaussian, at most `MAX_BLUR_SIGMA`
///
/// # Errors
/// `InvalidParameter` for a NaN, infinite or oversized sigma
pub fn gaussian_kernel_1d(sigma: f64) -> Result<Vec<f64>> {
    if !sigma.is_finite() || sigma > MAX_BLUR_SIGMA {
        return Err(CorrectionError::InvalidParameter {
            name: "sigma",
            value: sigma,
            min: 0.0,
            max: MAX_BLUR_SIGMA,
        });
    }
    if sigma <= 0.0 {
        return Ok(vec![1.0]);
    }

    let kernel_size = ((sigma * 6.0 + 1.0).round() as usize) | 1;
    let half = (kernel_size / 2) as f64;

    let mut kernel: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for v in kernel.iter_mut() {
        *v /= sum;
    }

    Ok(kernel)
}

/// Apply a separable Gaussian blur to an RGB u8 image.
///
/// Borders are mirrored (reflect-101) and the result is rounded to the
/// nearest integer.
///
/// # Arguments
/// * `input` - Image (height, width, 3)
/// * `sigma` - Standard deviation of the Gaussian, same on both axes
pub fn gaussian_blur_u8(input: ArrayView3<u8>, sigma: f64) -> Result<Array3<u8>> {
    let (height, width) = ensure_rgb(&input)?;
    let kernel = gaussian_kernel_1d(sigma)?;
    if kernel.len() == 1 {
        return Ok(input.to_owned());
    }

    let half = (kernel.len() / 2) as isize;

    let mut temp = Array3::<f64>::zeros((height, width, 3));

    // Horizontal pass
    for y in 0..height {
        for x in 0..width {
            for c in 0..3 {
                let mut sum = 0.0f64;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = reflect_101(x as isize + ki as isize - half, width);
                    sum += input[[y, sx, c]] as f64 * kv;
                }
                temp[[y, x, c]] = sum;
            }
        }
    }

    let mut output = Array3::<u8>::zeros((height, width, 3));

    // Vertical pass
    for y in 0..height {
        for x in 0..width {
            for c in 0..3 {
                let mut sum = 0.0f64;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = reflect_101(y as isize + ki as isize - half, height);
                    sum += temp[[sy, x, c]] * kv;
                }
                output[[y, x, c]] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Ok(output)
}

/// ITU-R 601-2 luma in 16-bit fixed point, rounded.
#[inline]
pub fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

/// Saturate a float to a channel value by truncation.
#[inline]
pub fn truncate_u8(v: f64) -> u8 {
    if v <= 0.0 {
        0
    } else if v >= 255.0 {
        255
    } else {
        v as u8
    }
}
