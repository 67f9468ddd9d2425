//! WebAssembly exports for the correction pipeline.
//!
//! These functions are exposed to JavaScript via wasm-bindgen. Images are
//! passed as flat RGB byte arrays (length = width * height * 3); errors,
//! including out-of-range strengths, are thrown as JS strings.

use ndarray::Array3;
use wasm_bindgen::prelude::*;

use crate::error::CorrectionError;
use crate::filters::chromatic::chromatic_aberration_u8;
use crate::filters::vignette::vignette_u8;
use crate::params::CorrectionParameters;
use crate::pipeline::Pipeline;

fn to_js_err(err: CorrectionError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_array(data: &[u8], width: usize, height: usize) -> Result<Array3<u8>, JsValue> {
    Array3::from_shape_vec((height, width, 3), data.to_vec())
        .map_err(|e| to_js_err(CorrectionError::from(e)))
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the full correction pipeline.
///
/// # Arguments
/// * `data` - Flat array of RGB bytes (length = width * height * 3)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
///
/// # Returns
/// Flat array of corrected RGB bytes
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn process_image_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    noise_strength: f64,
    brightness: f64,
    contrast: f64,
    saturation: f64,
    sharpness: f64,
    chromatic_aberration: f64,
    vignette_strength: f64,
    use_kmeans: bool,
    k_value: usize,
) -> Result<Vec<u8>, JsValue> {
    let input = to_array(data, width, height)?;
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

    let result = Pipeline::new()
        .process(input.view(), &params)
        .map_err(to_js_err)?;
    Ok(result.into_raw_vec_and_offset().0)
}

// ============================================================================
// Lens Effects
// ============================================================================

/// Chromatic aberration on a flat RGB buffer.
#[wasm_bindgen]
pub fn chromatic_aberration_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    strength: f64,
) -> Result<Vec<u8>, JsValue> {
    let input = to_array(data, width, height)?;
    let result = chromatic_aberration_u8(input.view(), strength).map_err(to_js_err)?;
    Ok(result.into_raw_vec_and_offset().0)
}

/// Vignette on a flat RGB buffer.
#[wasm_bindgen]
pub fn vignette_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    strength: f64,
) -> Result<Vec<u8>, JsValue> {
    let input = to_array(data, width, height)?;
    let result = vignette_u8(input.view(), strength).map_err(to_js_err)?;
    Ok(result.into_raw_vec_and_offset().0)
}
