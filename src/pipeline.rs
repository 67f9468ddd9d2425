//! The correction pipeline.
//!
//! Stages run in a fixed order, each one consuming the previous stage's
//! output:
//!
//! 1. [`NoiseInjector`]
//! 2. [`ToneAdjuster`] (brightness, contrast, saturation)
//! 3. [`ColorQuantizer`] (only with `use_kmeans`)
//! 4. [`DetailFilter`]
//! 5. [`ChromaticAberrationFilter`]
//! 6. [`VignetteFilter`]
//!
//! A stage whose parameters are at their neutral values is skipped; running
//! it would produce the same image. The first failing stage aborts the run
//! and no partial image is returned.

use std::time::Instant;

use log::debug;
use ndarray::{Array3, ArrayView3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::filters::chromatic::chromatic_aberration_u8;
use crate::filters::color_adjust::adjust_tone_u8;
use crate::filters::core::ensure_rgb;
use crate::filters::detail::detail_u8;
use crate::filters::noise::add_noise_u8;
use crate::filters::quantize::{quantize_colors_u8, QuantizationCache};
use crate::filters::vignette::vignette_u8;
use crate::params::CorrectionParameters;

/// One image-to-image step of the pipeline.
pub trait Stage {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// True when `apply` would return its input unchanged.
    fn is_noop(&self, params: &CorrectionParameters) -> bool;

    /// Produce a new image from `input`.
    fn apply(
        &mut self,
        input: ArrayView3<u8>,
        params: &CorrectionParameters,
    ) -> Result<Array3<u8>>;

    /// Memoized k-means results held by this stage, if any.
    fn quantization_cache(&self) -> Option<&QuantizationCache> {
        None
    }
}

// ============================================================================
// Stages
// ============================================================================

/// Additive uniform noise, drawing from an owned random source.
pub struct NoiseInjector<R: Rng> {
    rng: R,
}

impl<R: Rng> NoiseInjector<R> {
    pub fn new(rng: R) -> Self {
        NoiseInjector { rng }
    }
}

impl<R: Rng> Stage for NoiseInjector<R> {
    fn name(&self) -> &'static str {
        "noise"
    }

    fn is_noop(&self, params: &CorrectionParameters) -> bool {
        params.noise_strength == 0.0
    }

    fn apply(
        &mut self,
        input: ArrayView3<u8>,
        params: &CorrectionParameters,
    ) -> Result<Array3<u8>> {
        add_noise_u8(input, params.noise_strength, &mut self.rng)
    }
}

/// Brightness, contrast and saturation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ToneAdjuster;

impl Stage for ToneAdjuster {
    fn name(&self) -> &'static str {
        "tone"
    }

    fn is_noop(&self, params: &CorrectionParameters) -> bool {
        params.brightness == 1.0 && params.contrast == 1.0 && params.saturation == 1.0
    }

    fn apply(
        &mut self,
        input: ArrayView3<u8>,
        params: &CorrectionParameters,
    ) -> Result<Array3<u8>> {
        adjust_tone_u8(input, params.brightness, params.contrast, params.saturation)
    }
}

/// Bilateral smoothing + k-means palette reduction, optionally memoized.
#[derive(Debug, Default, Clone)]
pub struct ColorQuantizer {
    cache: Option<QuantizationCache>,
}

impl ColorQuantizer {
    pub fn new() -> Self {
        ColorQuantizer { cache: None }
    }

    pub fn with_cache(cache: QuantizationCache) -> Self {
        ColorQuantizer { cache: Some(cache) }
    }
}

impl Stage for ColorQuantizer {
    fn name(&self) -> &'static str {
        "quantize"
    }

    fn is_noop(&self, params: &CorrectionParameters) -> bool {
        !params.use_kmeans
    }

    fn apply(
        &mut self,
        input: ArrayView3<u8>,
        params: &CorrectionParameters,
    ) -> Result<Array3<u8>> {
        if !params.use_kmeans {
            return Ok(input.to_owned());
        }
        match self.cache.as_mut() {
            Some(cache) => cache.get_or_quantize(input, params.k_value),
            None => quantize_colors_u8(input, params.k_value),
        }
    }

    fn quantization_cache(&self) -> Option<&QuantizationCache> {
        self.cache.as_ref()
    }
}

/// Unsharp-mask sharpening or Gaussian softening.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetailFilter;

impl Stage for DetailFilter {
    fn name(&self) -> &'static str {
        "detail"
    }

    fn is_noop(&self, params: &CorrectionParameters) -> bool {
        params.sharpness == 0.0
    }

    fn apply(
        &mut self,
        input: ArrayView3<u8>,
        params: &CorrectionParameters,
    ) -> Result<Array3<u8>> {
        detail_u8(input, params.sharpness)
    }
}

/// Red/blue channel shift blended over the original.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromaticAberrationFilter;

impl Stage for ChromaticAberrationFilter {
    fn name(&self) -> &'static str {
        "chromatic_aberration"
    }

    fn is_noop(&self, params: &CorrectionParameters) -> bool {
        params.chromatic_aberration <= 0.0
    }

    fn apply(
        &mut self,
        input: ArrayView3<u8>,
        params: &CorrectionParameters,
    ) -> Result<Array3<u8>> {
        chromatic_aberration_u8(input, params.chromatic_aberration)
    }
}

/// Radial darkening.
#[derive(Debug, Default, Clone, Copy)]
pub struct VignetteFilter;

impl Stage for VignetteFilter {
    fn name(&self) -> &'static str {
        "vignette"
    }

    fn is_noop(&self, params: &CorrectionParameters) -> bool {
        params.vignette_strength <= 0.0
    }

    fn apply(
        &mut self,
        input: ArrayView3<u8>,
        params: &CorrectionParameters,
    ) -> Result<Array3<u8>> {
        vignette_u8(input, params.vignette_strength)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ordered chain of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Standard chain with an OS-seeded noise source.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Standard chain drawing noise from `rng`.
    pub fn with_rng<R: Rng + 'static>(rng: R) -> Self {
        Self::standard(rng, ColorQuantizer::new())
    }

    /// Standard chain with k-means results memoized in `cache`.
    pub fn with_cache<R: Rng + 'static>(rng: R, cache: QuantizationCache) -> Self {
        Self::standard(rng, ColorQuantizer::with_cache(cache))
    }

    fn standard<R: Rng + 'static>(rng: R, quantizer: ColorQuantizer) -> Self {
        Pipeline {
            stages: vec![
                Box::new(NoiseInjector::new(rng)),
                Box::new(ToneAdjuster),
                Box::new(quantizer),
                Box::new(DetailFilter),
                Box::new(ChromaticAberrationFilter),
                Box::new(VignetteFilter),
            ],
        }
    }

    /// Custom chain, run in the given order.
    pub fn from_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Pipeline { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// The k-means cache of the first stage that keeps one.
    pub fn quantization_cache(&self) -> Option<&QuantizationCache> {
        self.stages.iter().find_map(|s| s.quantization_cache())
    }

    /// Run every non-neutral stage over a copy of `input`.
    ///
    /// # Errors
    /// `InvalidParameter` if `params` fails validation, `UnsupportedChannels`
    /// or `EmptyImage` for a bad input, and `StageFailed` wrapping the first
    /// stage error.
    pub fn process(
        &mut self,
        input: ArrayView3<u8>,
        params: &CorrectionParameters,
    ) -> Result<Array3<u8>> {
        params.validate()?;
        let (height, width) = ensure_rgb(&input)?;

        let mut image = input.to_owned();
        for stage in self.stages.iter_mut() {
            let name = stage.name();
            if stage.is_noop(params) {
                debug!("{}: skipped (neutral)", name);
                continue;
            }
            let start = Instant::now();
            image = stage
                .apply(image.view(), params)
                .map_err(|e| e.in_stage(name))?;
            debug!("{}: {}x{} in {:?}", name, height, width, start.elapsed());
        }
        Ok(image)
    }
}

/// Run the standard pipeline once with an OS-seeded noise source.
///
/// The caller's image is never modified.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `params` - Validated against their documented ranges first
///
/// # Returns
/// Corrected image with same dimensions
pub fn process_image(
    input: ArrayView3<u8>,
    params: &CorrectionParameters,
) -> Result<Array3<u8>> {
    Pipeline::new().process(input, params)
}
