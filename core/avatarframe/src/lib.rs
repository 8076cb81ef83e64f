//! Portrait avatar processing: locate the head, frame it, optionally strip
//! the background, enhance, and emit a fixed-size square image.
//!
//! # Example
//!
//! ```no_run
//! use avatarframe::AvatarProcessor;
//!
//! let raw_bytes = std::fs::read("photo.jpg").unwrap();
//! let avatar = AvatarProcessor::new()
//!     .output_size(256)
//!     .process(&raw_bytes)
//!     .unwrap();
//! println!(
//!     "{}x{} avatar, face detected: {}",
//!     avatar.metadata.final_size.0,
//!     avatar.metadata.final_size.1,
//!     avatar.metadata.face_detected
//! );
//! ```
#![warn(missing_docs)]

/// Background-removal capability trait.
pub mod background;
mod config;
/// Crop geometry for detected faces and the portrait fallback.
pub mod crop;
/// Portrait enhancement filter chain.
pub mod enhance;
mod error;
/// Face detection traits, pass parameters and candidate selection.
pub mod face_detector;
mod pipeline;
#[cfg(feature = "rustface")]
/// Built-in SeetaFace-based face detector backend.
pub mod rustface_backend;

use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};

pub use background::BackgroundRemover;
/// TOML-loadable service configuration.
pub use config::AvatarConfig;
pub use crop::{CropRegion, FramingProfile};
pub use enhance::EnhancementSettings;
/// Error types returned by avatarframe operations.
pub use error::{AvatarError, BackgroundRemovalError, ConfigError, PipelineError, Stage};
pub use face_detector::{DetectionPass, FaceBounds, FaceCandidate, FaceDetector, SelectionPolicy};
#[cfg(feature = "rustface")]
/// Built-in detector that loads a SeetaFace model.
pub use rustface_backend::RustfaceDetector;

/// Which geometry produced the final crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CropSource {
    /// Padded around a detected face.
    Face,
    /// Portrait-aware fallback computed from image dimensions alone.
    Fallback,
}

/// Output image format. Both keep transparency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG encoding.
    #[default]
    Png,

    /// Lossless WebP encoding.
    Webp,
}

/// Facts about how an avatar was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvatarMetadata {
    /// A usable face was found, even if its crop was later rejected.
    pub face_detected: bool,

    /// Geometry that produced the crop.
    pub crop_source: CropSource,

    /// Output (width, height) in pixels.
    pub final_size: (u32, u32),

    /// Source (width, height) in pixels.
    pub original_size: (u32, u32),

    /// Size of the encoded input in bytes, 0 for pre-decoded input.
    pub input_bytes: usize,

    /// Region extracted from the source image.
    pub crop_region: CropRegion,

    /// The selected face box in source coordinates, if any.
    pub face_bounds: Option<FaceBounds>,

    /// Name of the detection pass that found the face.
    pub detection_pass: Option<&'static str>,

    /// Whether the background-removal step succeeded.
    pub background_removed: bool,

    /// Whether the enhancement chain ran. Always true for a produced avatar.
    pub enhanced: bool,
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessedAvatar {
    /// The final square RGBA image.
    pub image: RgbaImage,

    /// `image` encoded as `format`.
    pub data: Vec<u8>,

    /// Encoding of `data`.
    pub format: OutputFormat,

    /// How the avatar was produced.
    pub metadata: AvatarMetadata,
}

/// Reusable avatar pipeline.
///
/// Configure once, then call [`process`](Self::process) for each upload. The
/// processor holds no per-image state and can be shared across threads.
pub struct AvatarProcessor {
    output_size: u32,
    background_removal: bool,
    auto_crop: bool,
    background_timeout: Duration,
    selection_policy: SelectionPolicy,
    detection_passes: Vec<DetectionPass>,
    format: OutputFormat,
    framing: FramingProfile,
    enhancement: EnhancementSettings,
    /// When `None`, detection is skipped and the portrait fallback is used.
    detector: Option<Box<dyn FaceDetector>>,
    remover: Option<Arc<dyn BackgroundRemover>>,
}

impl Default for AvatarProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AvatarProcessor {
    /// Create a processor with default settings and no collaborators.
    pub fn new() -> Self {
        Self::with_config(&AvatarConfig::default())
    }

    fn with_config(config: &AvatarConfig) -> Self {
        Self {
            output_size: config.output_size,
            background_removal: config.background_removal,
            auto_crop: config.auto_crop,
            background_timeout: config.background_timeout(),
            selection_policy: config.selection_policy,
            detection_passes: DetectionPass::default_passes(),
            format: config.format,
            framing: FramingProfile::PORTRAIT,
            enhancement: EnhancementSettings::PORTRAIT,
            detector: None,
            remover: None,
        }
    }

    /// Create a processor from a loaded [`AvatarConfig`].
    ///
    /// With the `rustface` feature, a configured `rustface_model` is loaded
    /// and installed as the face detector.
    pub fn from_config(config: &AvatarConfig) -> Result<Self, AvatarError> {
        #[allow(unused_mut)]
        let mut processor = Self::with_config(config);

        #[cfg(feature = "rustface")]
        {
            if let Some(path) = &config.rustface_model {
                processor.detector = Some(Box::new(RustfaceDetector::from_path(path)?));
            }
        }

        Ok(processor)
    }

    /// Set the edge of the square output in pixels (default: 512).
    pub fn output_size(mut self, size: u32) -> Self {
        self.output_size = size;
        self
    }

    /// Enable or disable background removal (default: true).
    /// Has no effect unless a remover is attached.
    pub fn background_removal(mut self, enable: bool) -> Self {
        self.background_removal = enable;
        self
    }

    /// Enable or disable face detection (default: true).
    pub fn auto_crop(mut self, enable: bool) -> Self {
        self.auto_crop = enable;
        self
    }

    /// Set the budget for the background-removal call (default: 10 s).
    pub fn background_timeout(mut self, timeout: Duration) -> Self {
        self.background_timeout = timeout;
        self
    }

    /// Set how one face is chosen among same-pass candidates
    /// (default: [`SelectionPolicy::Largest`]).
    pub fn selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.selection_policy = policy;
        self
    }

    /// Replace the ordered list of detection passes
    /// (default: [`DetectionPass::default_passes`]).
    pub fn detection_passes(mut self, passes: Vec<DetectionPass>) -> Self {
        self.detection_passes = passes;
        self
    }

    /// Set the output encoding (default: [`OutputFormat::Png`]).
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Provide a face detector implementation.
    ///
    /// ```no_run
    /// use avatarframe::{AvatarProcessor, DetectionPass, FaceBounds, FaceDetector};
    ///
    /// struct MyDetector;
    /// impl FaceDetector for MyDetector {
    ///     fn detect(&self, gray: &[u8], width: u32, height: u32, pass: &DetectionPass) -> Vec<FaceBounds> {
    ///         // Your detection logic here
    ///         vec![]
    ///     }
    /// }
    ///
    /// let bytes = std::fs::read("photo.jpg").unwrap();
    /// let avatar = AvatarProcessor::new()
    ///     .face_detector(Box::new(MyDetector))
    ///     .process(&bytes)
    ///     .unwrap();
    /// ```
    pub fn face_detector(mut self, detector: Box<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Provide a background-removal implementation.
    pub fn background_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.remover = Some(remover);
        self
    }

    /// Decode `input` (JPEG, PNG or WebP) and run the pipeline.
    pub fn process(&self, input: &[u8]) -> Result<ProcessedAvatar, PipelineError> {
        let decoded = pipeline::decode_image(input).map_err(PipelineError::at(Stage::Decoding))?;
        pipeline::run_pipeline(self, &decoded, input.len())
    }

    /// Run the pipeline on an already decoded image. The image is not modified.
    pub fn process_image(&self, image: &DynamicImage) -> Result<ProcessedAvatar, PipelineError> {
        pipeline::run_pipeline(self, image, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_png(width: u32, height: u32) -> Vec<u8> {
        use image::codecs::png::PngEncoder;
        use image::ImageEncoder;
        use image::RgbImage;

        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ]);
        }
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new(&mut buffer);
        encoder
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        buffer
    }

    #[test]
    fn builder_defaults() {
        let png = make_test_png(200, 300);
        let avatar = AvatarProcessor::new().process(&png).unwrap();
        assert_eq!(avatar.metadata.final_size, (512, 512));
        assert_eq!(avatar.image.dimensions(), (512, 512));
        assert_eq!(avatar.format, OutputFormat::Png);
        assert!(!avatar.metadata.face_detected);
        assert_eq!(avatar.metadata.crop_source, CropSource::Fallback);
        assert!(!avatar.metadata.background_removed);
        assert!(avatar.metadata.enhanced);
    }

    #[test]
    fn custom_output_size() {
        let png = make_test_png(120, 80);
        let avatar = AvatarProcessor::new().output_size(64).process(&png).unwrap();
        assert_eq!(avatar.image.dimensions(), (64, 64));
        assert_eq!(avatar.metadata.original_size, (120, 80));
        assert_eq!(avatar.metadata.input_bytes, png.len());
    }

    #[test]
    fn output_is_encoded_png() {
        let png = make_test_png(100, 100);
        let avatar = AvatarProcessor::new().output_size(32).process(&png).unwrap();
        assert_eq!(&avatar.data[1..4], b"PNG");
        let decoded = image::load_from_memory(&avatar.data).unwrap();
        assert_eq!(decoded.width(), 32);
    }

    #[test]
    fn webp_format() {
        let png = make_test_png(100, 100);
        let avatar = AvatarProcessor::new()
            .output_size(32)
            .format(OutputFormat::Webp)
            .process(&png)
            .unwrap();
        assert_eq!(&avatar.data[0..4], b"RIFF");
    }

    #[test]
    fn zero_output_size_fails_at_resizing() {
        let png = make_test_png(100, 100);
        let err = AvatarProcessor::new().output_size(0).process(&png).unwrap_err();
        assert_eq!(err.stage, Stage::Resizing);
        assert!(matches!(err.source, AvatarError::InvalidOutputSize));
    }

    #[test]
    fn invalid_input_fails_at_decoding() {
        let err = AvatarProcessor::new().process(b"not an image").unwrap_err();
        assert_eq!(err.stage, Stage::Decoding);
        assert!(err.to_string().contains("decoding"));
    }

    #[test]
    fn process_image_leaves_source_untouched() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            50,
            80,
            image::Rgba([10, 20, 30, 255]),
        ));
        let before = source.clone();
        let avatar = AvatarProcessor::new().output_size(16).process_image(&source).unwrap();
        assert_eq!(source, before);
        assert_eq!(avatar.metadata.input_bytes, 0);
        // 50x80 portrait: full width, starting 8px down
        assert_eq!(
            avatar.metadata.crop_region,
            CropRegion {
                x: 0,
                y: 8,
                width: 50,
                height: 50,
            }
        );
    }

    #[test]
    fn from_default_config() {
        let processor = AvatarProcessor::from_config(&AvatarConfig::default()).unwrap();
        assert_eq!(processor.output_size, 512);
        assert_eq!(processor.detection_passes, DetectionPass::default_passes());
        assert_eq!(processor.enhancement, EnhancementSettings::PORTRAIT);
    }

    #[test]
    fn processor_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AvatarProcessor>();
    }
}
