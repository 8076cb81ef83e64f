use serde::{Deserialize, Serialize};

use crate::crop::validate_face;

/// Bounding box of a detected face within an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceBounds {
    /// X coordinate of the top-left corner (pixels).
    pub x: f64,
    /// Y coordinate of the top-left corner (pixels).
    pub y: f64,
    /// Width of the bounding box (pixels).
    pub width: f64,
    /// Height of the bounding box (pixels).
    pub height: f64,
    /// Detection confidence score.
    pub confidence: f64,
}

impl FaceBounds {
    /// Box area in square pixels.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Parameters for one detection pass.
///
/// Field names follow cascade-classifier conventions; backends that work
/// differently map them onto their own knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionPass {
    /// Label recorded on candidates found by this pass.
    pub name: &'static str,
    /// Image pyramid step between detection scales (> 1.0).
    pub scale_factor: f32,
    /// Neighbor agreement required to accept a window. Lower is more permissive.
    pub min_neighbors: u32,
    /// Smallest face edge considered, in pixels.
    pub min_face_size: u32,
    /// Largest face as a fraction of each image dimension, if capped.
    pub max_face_fraction: Option<f32>,
}

impl DetectionPass {
    /// Sensitive first pass.
    pub const PRIMARY: DetectionPass = DetectionPass {
        name: "primary",
        scale_factor: 1.05,
        min_neighbors: 3,
        min_face_size: 20,
        max_face_fraction: Some(0.8),
    };

    /// Relaxed pass, run only when the primary pass finds nothing.
    pub const FALLBACK: DetectionPass = DetectionPass {
        name: "fallback",
        scale_factor: 1.1,
        min_neighbors: 2,
        min_face_size: 15,
        max_face_fraction: None,
    };

    /// The default ordered pass list.
    pub fn default_passes() -> Vec<DetectionPass> {
        vec![Self::PRIMARY, Self::FALLBACK]
    }

    /// Maximum face (width, height) for an image of the given size.
    pub fn max_face_size(&self, width: u32, height: u32) -> Option<(f64, f64)> {
        self.max_face_fraction
            .map(|f| (width as f64 * f as f64, height as f64 * f as f64))
    }

    fn accepts(&self, face: &FaceBounds, width: u32, height: u32) -> bool {
        let min = self.min_face_size as f64;
        if face.width < min || face.height < min {
            return false;
        }
        match self.max_face_size(width, height) {
            Some((max_w, max_h)) => face.width <= max_w && face.height <= max_h,
            None => true,
        }
    }
}

/// A face box tagged with the pass that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceCandidate {
    /// Face box in source-image pixel coordinates.
    pub bounds: FaceBounds,
    /// Index of the producing pass in the pass list. Lower ranks higher.
    pub pass_index: usize,
    /// Name of the producing pass.
    pub pass_name: &'static str,
}

/// How to pick one face among candidates of the same pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Largest box area wins.
    #[default]
    Largest,
    /// Box whose center is nearest the image center wins.
    MostCentered,
}

/// Pluggable face detection backend.
///
/// Implement this trait to provide a custom face detector (Haar cascade,
/// ONNX, dlib, etc.) and pass it to [`crate::AvatarProcessor::face_detector`].
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height`
    /// bytes using the parameters of `pass`.
    fn detect(&self, gray: &[u8], width: u32, height: u32, pass: &DetectionPass)
        -> Vec<FaceBounds>;
}

/// Run `passes` in order and return the candidates of the first pass that
/// yields any.
///
/// Boxes violating a pass's size limits or reaching outside the image are
/// discarded before the pass is judged empty, so an oversized whole-image
/// hit falls through to the next pass and a border-straddling box never
/// outranks a usable one.
pub fn detect_faces(
    detector: &dyn FaceDetector,
    gray: &[u8],
    width: u32,
    height: u32,
    passes: &[DetectionPass],
) -> Vec<FaceCandidate> {
    for (pass_index, pass) in passes.iter().enumerate() {
        let candidates: Vec<FaceCandidate> = detector
            .detect(gray, width, height, pass)
            .into_iter()
            .filter(|face| pass.accepts(face, width, height))
            .filter(|face| validate_face(face, width, height).is_ok())
            .map(|bounds| FaceCandidate {
                bounds,
                pass_index,
                pass_name: pass.name,
            })
            .collect();

        tracing::debug!(
            pass = pass.name,
            candidates = candidates.len(),
            "face detection pass finished"
        );

        if !candidates.is_empty() {
            return candidates;
        }
    }
    Vec::new()
}

/// Pick the best candidate.
///
/// Earlier passes always outrank later ones. Within a pass, `policy` decides;
/// ties keep the first candidate in detector order.
pub fn select_best<'a>(
    candidates: &'a [FaceCandidate],
    policy: SelectionPolicy,
    image_width: u32,
    image_height: u32,
) -> Option<&'a FaceCandidate> {
    let best_pass = candidates.iter().map(|c| c.pass_index).min()?;
    let (cx, cy) = (image_width as f64 / 2.0, image_height as f64 / 2.0);

    let score = |c: &FaceCandidate| -> f64 {
        match policy {
            SelectionPolicy::Largest => c.bounds.area(),
            SelectionPolicy::MostCentered => {
                let (fx, fy) = c.bounds.center();
                -((fx - cx).powi(2) + (fy - cy).powi(2))
            }
        }
    };

    let mut best: Option<&FaceCandidate> = None;
    for candidate in candidates.iter().filter(|c| c.pass_index == best_pass) {
        match best {
            Some(current) if score(candidate) <= score(current) => {}
            _ => best = Some(candidate),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn face(x: f64, y: f64, width: f64, height: f64) -> FaceBounds {
        FaceBounds {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    /// Returns canned results per pass name and records which passes ran.
    struct ScriptedDetector {
        primary: Vec<FaceBounds>,
        fallback: Vec<FaceBounds>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedDetector {
        fn new(primary: Vec<FaceBounds>, fallback: Vec<FaceBounds>) -> Self {
            Self {
                primary,
                fallback,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(&self, _: &[u8], _: u32, _: u32, pass: &DetectionPass) -> Vec<FaceBounds> {
            self.calls.lock().unwrap().push(pass.name);
            match pass.name {
                "primary" => self.primary.clone(),
                _ => self.fallback.clone(),
            }
        }
    }

    #[test]
    fn primary_parameters() {
        let p = DetectionPass::PRIMARY;
        assert_eq!(p.scale_factor, 1.05);
        assert_eq!(p.min_neighbors, 3);
        assert_eq!(p.min_face_size, 20);
        assert_eq!(p.max_face_fraction, Some(0.8));
    }

    #[test]
    fn fallback_is_more_relaxed() {
        let (p, f) = (DetectionPass::PRIMARY, DetectionPass::FALLBACK);
        assert!(f.min_neighbors < p.min_neighbors);
        assert!(f.min_face_size < p.min_face_size);
        assert!(f.max_face_fraction.is_none());
    }

    #[test]
    fn fallback_skipped_when_primary_finds_faces() {
        let det = ScriptedDetector::new(vec![face(10.0, 10.0, 40.0, 40.0)], vec![]);
        let found = detect_faces(&det, &[], 200, 200, &DetectionPass::default_passes());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pass_name, "primary");
        assert_eq!(*det.calls.lock().unwrap(), vec!["primary"]);
    }

    #[test]
    fn fallback_runs_when_primary_is_empty() {
        let det = ScriptedDetector::new(vec![], vec![face(10.0, 10.0, 16.0, 16.0)]);
        let found = detect_faces(&det, &[], 200, 200, &DetectionPass::default_passes());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pass_index, 1);
        assert_eq!(*det.calls.lock().unwrap(), vec!["primary", "fallback"]);
    }

    #[test]
    fn oversized_primary_hit_is_discarded() {
        // 190px on a 200px image exceeds the 0.8 cap
        let det = ScriptedDetector::new(vec![face(5.0, 5.0, 190.0, 190.0)], vec![]);
        let found = detect_faces(&det, &[], 200, 200, &DetectionPass::default_passes());
        assert!(found.is_empty());
    }

    #[test]
    fn undersized_hits_are_discarded() {
        let det = ScriptedDetector::new(vec![face(0.0, 0.0, 19.0, 40.0)], vec![face(0.0, 0.0, 14.0, 14.0)]);
        let found = detect_faces(&det, &[], 200, 200, &DetectionPass::default_passes());
        assert!(found.is_empty());
    }

    #[test]
    fn boxes_outside_the_image_are_discarded() {
        let det = ScriptedDetector::new(
            vec![face(-2.0, 10.0, 100.0, 100.0), face(120.0, 120.0, 90.0, 90.0)],
            vec![face(40.0, 40.0, 30.0, 30.0)],
        );
        let found = detect_faces(&det, &[], 200, 200, &DetectionPass::default_passes());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bounds.x, 40.0);
    }

    #[test]
    fn largest_wins_within_a_pass() {
        let det = ScriptedDetector::new(
            vec![
                face(0.0, 0.0, 30.0, 30.0),
                face(100.0, 100.0, 60.0, 50.0),
                face(50.0, 50.0, 40.0, 40.0),
            ],
            vec![],
        );
        let found = detect_faces(&det, &[], 400, 400, &DetectionPass::default_passes());
        let best = select_best(&found, SelectionPolicy::Largest, 400, 400).unwrap();
        assert_eq!(best.bounds.x, 100.0);
    }

    #[test]
    fn earlier_pass_outranks_larger_box() {
        let candidates = vec![
            FaceCandidate {
                bounds: face(0.0, 0.0, 300.0, 300.0),
                pass_index: 1,
                pass_name: "fallback",
            },
            FaceCandidate {
                bounds: face(10.0, 10.0, 20.0, 20.0),
                pass_index: 0,
                pass_name: "primary",
            },
        ];
        let best = select_best(&candidates, SelectionPolicy::Largest, 400, 400).unwrap();
        assert_eq!(best.pass_name, "primary");
    }

    #[test]
    fn most_centered_policy() {
        let candidates: Vec<FaceCandidate> = [face(0.0, 0.0, 80.0, 80.0), face(180.0, 180.0, 40.0, 40.0)]
            .into_iter()
            .map(|bounds| FaceCandidate {
                bounds,
                pass_index: 0,
                pass_name: "primary",
            })
            .collect();
        let best = select_best(&candidates, SelectionPolicy::MostCentered, 400, 400).unwrap();
        assert_eq!(best.bounds.x, 180.0);
    }

    #[test]
    fn select_best_of_nothing() {
        assert!(select_best(&[], SelectionPolicy::Largest, 10, 10).is_none());
    }
}
