use std::path::Path;

use crate::error::AvatarError;
use crate::face_detector::{DetectionPass, FaceBounds, FaceDetector};

/// SeetaFace score threshold per unit of cascade neighbor agreement.
/// Three neighbors map to the engine's customary threshold of 2.0.
const SCORE_PER_NEIGHBOR: f64 = 2.0 / 3.0;

/// Face detector backed by the `rustface` crate (SeetaFace engine).
///
/// The model is loaded once; a fresh engine is configured from it for every
/// detection pass.
pub struct RustfaceDetector {
    model: rustface::Model,
}

impl RustfaceDetector {
    /// Load a SeetaFace model (e.g. `seeta_fd_frontal_v1.0.bin`) from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AvatarError> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| AvatarError::ModelLoad(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&data)
    }

    /// Load a SeetaFace model from an in-memory buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self, AvatarError> {
        let model = rustface::read_model(std::io::Cursor::new(data))
            .map_err(|e| AvatarError::ModelLoad(e.to_string()))?;
        Ok(Self { model })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(
        &self,
        gray: &[u8],
        width: u32,
        height: u32,
        pass: &DetectionPass,
    ) -> Vec<FaceBounds> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(pass.min_face_size);
        detector.set_score_thresh(pass.min_neighbors as f64 * SCORE_PER_NEIGHBOR);
        detector.set_pyramid_scale_factor(1.0 / pass.scale_factor);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray, width, height));

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBounds {
                    x: bbox.x() as f64,
                    y: bbox.y() as f64,
                    width: bbox.width() as f64,
                    height: bbox.height() as f64,
                    confidence: face.score(),
                }
            })
            .collect()
    }
}
