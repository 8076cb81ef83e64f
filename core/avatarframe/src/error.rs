use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single pipeline stage.
#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("failed to decode image: {0}")]
    DecodeError(String),

    #[error("image dimensions are zero")]
    ZeroDimensions,

    #[error("failed to encode image: {0}")]
    EncodeError(String),

    #[error("output size must be > 0")]
    InvalidOutputSize,

    #[error("failed to load face detection model: {0}")]
    ModelLoad(String),

    #[error("invalid face box ({x}, {y}, {width}x{height}) for {image_width}x{image_height} image")]
    InvalidDetection {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image_width: u32,
        image_height: u32,
    },

    #[error("crop {width}x{height} at ({x}, {y}) is not valid for {image_width}x{image_height} image")]
    CropOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },
}

/// Failure of the external background-removal capability. Never fatal.
#[derive(Debug, Error)]
pub enum BackgroundRemovalError {
    #[error("background removal timed out after {0:?}")]
    Timeout(Duration),

    #[error("background removal failed: {0}")]
    Failed(String),

    #[error("background removal worker exited without a result")]
    Disconnected,
}

/// Error loading an [`AvatarConfig`](crate::AvatarConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Stages of the avatar pipeline, in execution order.
///
/// Only `Decoding`, `Cropping`, `Resizing` and `Encoding` currently produce a
/// [`PipelineError`]. Detection and enhancement cannot fail, and background
/// removal degrades instead of failing; their variants only complete the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decoding,
    Detecting,
    Cropping,
    BackgroundRemoval,
    Enhancing,
    Resizing,
    Encoding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decoding => "decoding",
            Stage::Detecting => "detecting",
            Stage::Cropping => "cropping",
            Stage::BackgroundRemoval => "background removal",
            Stage::Enhancing => "enhancing",
            Stage::Resizing => "resizing",
            Stage::Encoding => "encoding",
        };
        f.write_str(name)
    }
}

/// Fatal pipeline failure. No partial avatar is produced.
#[derive(Debug, Error)]
#[error("avatar pipeline failed during {stage}: {source}")]
pub struct PipelineError {
    /// The stage that could not recover.
    pub stage: Stage,
    /// The underlying stage error.
    #[source]
    pub source: AvatarError,
}

impl PipelineError {
    pub(crate) fn at(stage: Stage) -> impl FnOnce(AvatarError) -> Self {
        move |source| Self { stage, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_read_as_prose() {
        assert_eq!(Stage::BackgroundRemoval.to_string(), "background removal");
        assert_eq!(Stage::Detecting.to_string(), "detecting");
    }

    #[test]
    fn pipeline_error_names_stage_and_cause() {
        let err = PipelineError::at(Stage::Cropping)(AvatarError::ZeroDimensions);
        assert_eq!(err.stage, Stage::Cropping);
        assert!(err.to_string().starts_with("avatar pipeline failed during cropping: "));
    }
}
