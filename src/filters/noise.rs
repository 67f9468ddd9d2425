//! Additive uniform noise.
//!
//! Breaks up the perfectly smooth gradients typical of generated artwork.
//! The random source is passed in by the caller, so tests can use a seeded
//! generator and production code an OS-seeded one.

use ndarray::{Array3, ArrayView3};
use rand::Rng;

use super::core::ensure_rgb;
use crate::error::Result;
use crate::params::NOISE_RANGE;

/// Add independent uniform noise to every channel of every pixel.
///
/// Channels are normalized to [0, 1], offset by a sample from
/// `[-strength, +strength)`, clipped and scaled back (truncating) to 0-255.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `strength` - Noise amplitude (0.0-0.2, 0.0 = no change)
/// * `rng` - Random source
///
/// # Returns
/// Noisy image with same dimensions, or `InvalidParameter` when `strength`
/// is outside 0.0-0.2
pub fn add_noise_u8<R: Rng>(
    input: ArrayView3<u8>,
    strength: f64,
    rng: &mut R,
) -> Result<Array3<u8>> {
    let (height, width) = ensure_rgb(&input)?;
    NOISE_RANGE.check("noise_strength", strength)?;
    if strength == 0.0 {
        return Ok(input.to_owned());
    }

    let mut output = Array3::<u8>::zeros((height, width, 3));

    for y in 0..height {
        for x in 0..width {
            for c in 0..3 {
                let noise = (rng.random::<f64>() - 0.5) * (strength * 2.0);
                let v = (input[[y, x, c]] as f64 / 255.0 + noise).clamp(0.0, 1.0);
                output[[y, x, c]] = (v * 255.0) as u8;
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gray(height: usize, width: usize, value: u8) -> Array3<u8> {
        Array3::<u8>::from_elem((height, width, 3), value)
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let mut img = gray(4, 4, 10);
        img[[1, 2, 0]] = 200;
        let mut rng = StdRng::seed_from_u64(1);
        let result = add_noise_u8(img.view(), 0.0, &mut rng).unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn test_noise_within_bounds() {
        let img = gray(32, 32, 128);
        let strength = 0.1f64;
        let mut rng = StdRng::seed_from_u64(7);
        let result = add_noise_u8(img.view(), strength, &mut rng).unwrap();

        // Truncation can cost one extra level
        let max_dev = (strength * 255.0).ceil() as i32 + 1;
        for v in result.iter() {
            assert!((*v as i32 - 128).abs() <= max_dev, "value {} out of bounds", v);
        }
    }

    #[test]
    fn test_noise_statistics() {
        let img = gray(64, 64, 128);
        let mut rng = StdRng::seed_from_u64(42);
        let result = add_noise_u8(img.view(), 0.2, &mut rng).unwrap();

        let n = result.len() as f64;
        let mean = result.iter().map(|&v| v as f64).sum::<f64>() / n;
        // Truncation biases the mean down by about half a level
        assert!((mean - 127.5).abs() < 1.5, "mean {}", mean);

        let changed = result.iter().filter(|&&v| v != 128).count();
        assert!(changed as f64 > n * 0.9);
    }

    #[test]
    fn test_noise_clips_at_extremes() {
        let mut img = gray(16, 16, 0);
        for y in 0..8 {
            for x in 0..16 {
                for c in 0..3 {
                    img[[y, x, c]] = 255;
                }
            }
        }
        let mut rng = StdRng::seed_from_u64(3);
        let result = add_noise_u8(img.view(), 0.2, &mut rng).unwrap();
        assert_eq!(result.dim(), (16, 16, 3));
        assert!(result.iter().any(|&v| v == 255));
        assert!(result.iter().any(|&v| v == 0));
    }

    #[test]
    fn test_rejects_strength_outside_range() {
        let img = gray(4, 4, 100);
        let mut rng = StdRng::seed_from_u64(0);
        for strength in [-0.1, 0.5, f64::NAN] {
            assert!(add_noise_u8(img.view(), strength, &mut rng).is_err());
        }
    }

    #[test]
    fn test_rejects_grayscale_input() {
        let img = Array3::<u8>::zeros((4, 4, 1));
        let mut rng = StdRng::seed_from_u64(0);
        assert!(add_noise_u8(img.view(), 0.1, &mut rng).is_err());
    }
}
