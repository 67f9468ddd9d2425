//! Filter kernels of the correction pipeline.
//!
//! ## Supported Format
//!
//! | Format | Shape | Type | Description |
//! |--------|-------|------|-------------|
//! | RGB8 | (H, W, 3) | u8 | Red, green, blue, 0-255 |
//!
//! Every kernel takes an `ArrayView3<u8>` and returns a new `Array3<u8>` of
//! the same dimensions; inputs are never modified. Grayscale, RGBA and empty
//! images are rejected with an error rather than processed partially.
//!
//! ## Filters
//!
//! - **Noise**: add_noise (uniform, caller-supplied RNG)
//! - **Tone**: brightness, contrast, saturation
//! - **Quantize**: bilateral filter, k-means palette reduction, result cache
//! - **Detail**: unsharp-mask sharpen / Gaussian soften
//! - **Chromatic**: red/blue channel shift with 30% blend
//! - **Vignette**: radial darkening mask
//!
//! Each filter is the identity at its neutral parameter value.

pub mod core;
pub mod noise;
pub mod color_adjust;
pub mod quantize;
pub mod detail;
pub mod chromatic;
pub mod vignette;
