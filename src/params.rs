//! Correction parameters.
//!
//! Every knob has a fixed valid range and a neutral value at which the
//! corresponding stage is a no-op. The ranges are exposed as constants so a
//! UI layer can build its sliders from the same table the pipeline validates
//! against.

use crate::error::{CorrectionError, Result};

/// Valid range and neutral value of one scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub neutral: f64,
}

impl ParamRange {
    const fn new(min: f64, max: f64, neutral: f64) -> Self {
        ParamRange { min, max, neutral }
    }

    /// True when `value` is finite and inside `[min, max]`.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Clamp into range. NaN maps to the neutral value.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.neutral
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Error naming `name` when `value` is not inside the range.
    pub(crate) fn check(&self, name: &'static str, value: f64) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(CorrectionError::InvalidParameter {
                name,
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

pub const NOISE_RANGE: ParamRange = ParamRange::new(0.0, 0.2, 0.0);
pub const BRIGHTNESS_RANGE: ParamRange = ParamRange::new(0.5, 1.5, 1.0);
pub const CONTRAST_RANGE: ParamRange = ParamRange::new(0.5, 1.5, 1.0);
pub const SATURATION_RANGE: ParamRange = ParamRange::new(0.0, 2.0, 1.0);
pub const SHARPNESS_RANGE: ParamRange = ParamRange::new(-5.0, 5.0, 0.0);
pub const CHROMATIC_ABERRATION_RANGE: ParamRange = ParamRange::new(0.0, 5.0, 0.0);
pub const VIGNETTE_RANGE: ParamRange = ParamRange::new(0.0, 0.8, 0.0);

/// Smallest and largest k-means cluster count.
pub const K_MIN: usize = 8;
pub const K_MAX: usize = 48;
/// Cluster count used when none is chosen.
pub const K_DEFAULT: usize = 24;

/// Error unless `k` is inside `[K_MIN, K_MAX]`.
pub(crate) fn check_k(k: usize) -> Result<()> {
    if (K_MIN..=K_MAX).contains(&k) {
        Ok(())
    } else {
        Err(CorrectionError::InvalidParameter {
            name: "k_value",
            value: k as f64,
            min: K_MIN as f64,
            max: K_MAX as f64,
        })
    }
}

/// Parameters of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionParameters {
    pub noise_strength: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    /// Positive sharpens, negative blurs.
    pub sharpness: f64,
    pub chromatic_aberration: f64,
    pub vignette_strength: f64,
    pub use_kmeans: bool,
    /// Ignored unless `use_kmeans` is set.
    pub k_value: usize,
}

impl Default for CorrectionParameters {
    fn default() -> Self {
        Self::neutral()
    }
}

impl CorrectionParameters {
    /// Every stage at its no-op value.
    pub fn neutral() -> Self {
        CorrectionParameters {
            noise_strength: NOISE_RANGE.neutral,
            brightness: BRIGHTNESS_RANGE.neutral,
            contrast: CONTRAST_RANGE.neutral,
            saturation: SATURATION_RANGE.neutral,
            sharpness: SHARPNESS_RANGE.neutral,
            chromatic_aberration: CHROMATIC_ABERRATION_RANGE.neutral,
            vignette_strength: VIGNETTE_RANGE.neutral,
            use_kmeans: false,
            k_value: K_DEFAULT,
        }
    }

    /// A gentle "naturalize" preset: light grain, slightly muted color,
    /// a touch of sharpening, fringe and vignette.
    pub fn natural() -> Self {
        CorrectionParameters {
            noise_strength: 0.03,
            brightness: 1.0,
            contrast: 0.98,
            saturation: 0.95,
            sharpness: 0.4,
            chromatic_aberration: 0.4,
            vignette_strength: 0.15,
            use_kmeans: false,
            k_value: K_DEFAULT,
        }
    }

    /// Reject the first field outside its range.
    pub fn validate(&self) -> Result<()> {
        NOISE_RANGE.check("noise_strength", self.noise_strength)?;
        BRIGHTNESS_RANGE.check("brightness", self.brightness)?;
        CONTRAST_RANGE.check("contrast", self.contrast)?;
        SATURATION_RANGE.check("saturation", self.saturation)?;
        SHARPNESS_RANGE.check("sharpness", self.sharpness)?;
        CHROMATIC_ABERRATION_RANGE.check("chromatic_aberration", self.chromatic_aberration)?;
        VIGNETTE_RANGE.check("vignette_strength", self.vignette_strength)?;

        if self.use_kmeans {
            check_k(self.k_value)?;
        }
        Ok(())
    }

    /// Copy with every field forced into range.
    pub fn clamped(&self) -> Self {
        CorrectionParameters {
            noise_strength: NOISE_RANGE.clamp(self.noise_strength),
            brightness: BRIGHTNESS_RANGE.clamp(self.brightness),
            contrast: CONTRAST_RANGE.clamp(self.contrast),
            saturation: SATURATION_RANGE.clamp(self.saturation),
            sharpness: SHARPNESS_RANGE.clamp(self.sharpness),
            chromatic_aberration: CHROMATIC_ABERRATION_RANGE.clamp(self.chromatic_aberration),
            vignette_strength: VIGNETTE_RANGE.clamp(self.vignette_strength),
            use_kmeans: self.use_kmeans,
            k_value: self.k_value.clamp(K_MIN, K_MAX),
        }
    }

    /// True when running the pipeline would return the input unchanged.
    pub fn is_neutral(&self) -> bool {
        self.noise_strength == NOISE_RANGE.neutral
            && self.brightness == BRIGHTNESS_RANGE.neutral
            && self.contrast == CONTRAST_RANGE.neutral
            && self.saturation == SATURATION_RANGE.neutral
            && self.sharpness == SHARPNESS_RANGE.neutral
            && self.chromatic_aberration == CHROMATIC_ABERRATION_RANGE.neutral
            && self.vignette_strength == VIGNETTE_RANGE.neutral
            && !self.use_kmeans
    }
}
