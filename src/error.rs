//! Error type shared by every filter and the pipeline.

use thiserror::Error;

/// Errors raised by the correction filters and the pipeline.
#[derive(Debug, Error)]
pub enum CorrectionError {
    /// A parameter lies outside its documented range (or is not finite).
    #[error("parameter `{name}` = {value} is outside [{min}, {max}]")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The image has no pixels.
    #[error("image is empty ({height}x{width})")]
    EmptyImage { height: usize, width: usize },

    /// The image is not a 3-channel RGB raster.
    #[error("expected 3 RGB channels, got {0}")]
    UnsupportedChannels(usize),

    /// A flat buffer does not match the requested dimensions.
    #[error("invalid image shape")]
    InvalidShape(#[from] ndarray::ShapeError),

    /// k-means was asked for more clusters than there are samples.
    #[error("cannot form {clusters} clusters from {pixels} pixels")]
    TooFewPixels { pixels: usize, clusters: usize },

    /// A pipeline stage failed; the chain was aborted.
    #[error("stage `{stage}` failed: {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: Box<CorrectionError>,
    },
}

impl CorrectionError {
    /// Wrap an error with the name of the stage that produced it.
    pub fn in_stage(self, stage: &'static str) -> Self {
        CorrectionError::StageFailed {
            stage,
            source: Box::new(self),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CorrectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_message_names_stage() {
        let err = CorrectionError::EmptyImage { height: 0, width: 4 }.in_stage("vignette");
        let msg = err.to_string();
        assert!(msg.contains("vignette"));
        assert!(msg.contains("0x4"));
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = CorrectionError::InvalidParameter {
            name: "brightness",
            value: 2.0,
            min: 0.5,
            max: 1.5,
        };
        assert_eq!(err.to_string(), "parameter `brightness` = 2 is outside [0.5, 1.5]");
    }
}
