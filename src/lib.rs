//! Naturalize: illustration correction filters
//!
//! Makes generated illustrations look less synthetic by running them through
//! a fixed chain of filters: grain, tone, optional palette reduction, detail,
//! chromatic aberration and vignette. Available from Rust, from Python via
//! PyO3 and from JavaScript via WASM.
//!
//! ## Image Format
//! Images are `ndarray` arrays of shape (height, width, 3) holding RGB `u8`
//! values (0-255). Every filter returns a new array of the same dimensions.
//!
//! ## Example
//! ```
//! use naturalize::{process_image, CorrectionParameters};
//! use ndarray::Array3;
//!
//! let image = Array3::<u8>::from_elem((32, 32, 3), 128);
//! let params = CorrectionParameters {
//!     vignette_strength: 0.3,
//!     ..Default::default()
//! };
//! let corrected = process_image(image.view(), &params).unwrap();
//! assert_eq!(corrected.dim(), image.dim());
//! ```

pub mod error;
pub mod filters;
pub mod params;
pub mod pipeline;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{CorrectionError, Result};
pub use filters::quantize::QuantizationCache;
pub use params::CorrectionParameters;
pub use pipeline::{
    process_image, ChromaticAberrationFilter, ColorQuantizer, DetailFilter, NoiseInjector,
    Pipeline, Stage, ToneAdjuster, VignetteFilter,
};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::error::CorrectionError;
    use crate::filters::chromatic;
    use crate::filters::color_adjust;
    use crate::filters::detail;
    use crate::filters::noise as noise_mod;
    use crate::filters::quantize;
    use crate::filters::vignette as vignette_mod;
    use crate::params::{check_k, CorrectionParameters};
    use crate::pipeline::Pipeline;

    fn to_py_err(err: CorrectionError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }

    fn rng_from(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Run the full correction pipeline.
    ///
    /// Raises `ValueError` for out-of-range parameters or a non-RGB image.
    #[pyfunction]
    #[pyo3(signature = (
        image,
        noise_strength=0.0,
        brightness=1.0,
        contrast=1.0,
        saturation=1.0,
        sharpness=0.0,
        chromatic_aberration=0.0,
        vignette_strength=0.0,
        use_kmeans=false,
        k_value=24,
        seed=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn process_image<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        noise_strength: f64,
        brightness: f64,
        contrast: f64,
        saturation: f64,
        sharpness: f64,
        chromatic_aberration: f64,
        vignette_strength: f64,
        use_kmeans: bool,
        k_value: usize,
        seed: Option<u64>,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let params = CorrectionParameters {
            noise_strength,
            brightness,
            contrast,
            saturation,
            sharpness,
            chromatic_aberration,
            vignette_strength,
            use_kmeans,
            k_value,
        };
        let result = Pipeline::with_rng(rng_from(seed))
            .process(image.as_array(), &params)
            .map_err(to_py_err)?;
        Ok(result.into_pyarray(py))
    }

    // ========================================================================
    // Individual Stages
    // ========================================================================

    #[pyfunction]
    #[pyo3(signature = (image, strength, seed=None))]
    pub fn add_noise<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        strength: f64,
        seed: Option<u64>,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let mut rng = rng_from(seed);
        let result = noise_mod::add_noise_u8(image.as_array(), strength, &mut rng)
            .map_err(to_py_err)?;
        Ok(result.into_pyarray(py))
    }

    #[pyfunction]
    #[pyo3(signature = (image, brightness=1.0, contrast=1.0, saturation=1.0))]
    pub fn adjust_tone<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        brightness: f64,
        contrast: f64,
        saturation: f64,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let result =
            color_adjust::adjust_tone_u8(image.as_array(), brightness, contrast, saturation)
                .map_err(to_py_err)?;
        Ok(result.into_pyarray(py))
    }

    /// Raises `ValueError` unless `k` is within 8-48.
    #[pyfunction]
    pub fn quantize_colors<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        k: usize,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        check_k(k).map_err(to_py_err)?;
        let result = quantize::quantize_colors_u8(image.as_array(), k).map_err(to_py_err)?;
        Ok(result.into_pyarray(py))
    }

    #[pyfunction]
    pub fn detail_filter<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        sharpness: f64,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let result = detail::detail_u8(image.as_array(), sharpness).map_err(to_py_err)?;
        Ok(result.into_pyarray(py))
    }

    #[pyfunction]
    pub fn chromatic_aberration<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        strength: f64,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let result =
            chromatic::chromatic_aberration_u8(image.as_array(), strength).map_err(to_py_err)?;
        Ok(result.into_pyarray(py))
    }

    #[pyfunction]
    pub fn vignette<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        strength: f64,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let result = vignette_mod::vignette_u8(image.as_array(), strength).map_err(to_py_err)?;
        Ok(result.into_pyarray(py))
    }

    /// Naturalize Rust extension module
    #[pymodule]
    pub fn naturalize(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(process_image, m)?)?;

        m.add_function(wrap_pyfunction!(add_noise, m)?)?;
        m.add_function(wrap_pyfunction!(adjust_tone, m)?)?;
        m.add_function(wrap_pyfunction!(quantize_colors, m)?)?;
        m.add_function(wrap_pyfunction!(detail_filter, m)?)?;
        m.add_function(wrap_pyfunction!(chromatic_aberration, m)?)?;
        m.add_function(wrap_pyfunction!(vignette, m)?)?;

        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::naturalize;
