//! Show what each detection pass finds and which crop the pipeline would use.
//!
//! Usage:
//!   cargo run --example debug_face_detection --features rustface -- <model.bin> <photo>...

use avatarframe::crop::{compute_crop_from_face, compute_fallback_crop};
use avatarframe::{DetectionPass, FaceDetector, RustfaceDetector};

fn main() {
    let mut args = std::env::args().skip(1);
    let model_path = args
        .next()
        .expect("usage: debug_face_detection <model.bin> <photo>...");
    let detector = RustfaceDetector::from_path(&model_path).expect("failed to load model");

    for sample in args {
        let input = std::fs::read(&sample).unwrap();
        let image = image::load_from_memory(&input).unwrap();
        let gray = image::imageops::grayscale(&image);
        let (width, height) = (gray.width(), gray.height());

        println!("=== {sample} ({width}x{height}) ===");

        for pass in DetectionPass::default_passes() {
            let faces = detector.detect(gray.as_raw(), width, height, &pass);
            println!("  {} pass: {} raw hit(s)", pass.name, faces.len());
            for (i, face) in faces.iter().enumerate() {
                println!(
                    "    face {i}: score={:.2}, bbox=({}, {}, {}x{})",
                    face.confidence, face.x, face.y, face.width, face.height,
                );
                match compute_crop_from_face(face, width, height) {
                    Ok(crop) => println!(
                        "      → face crop: ({}, {}, {}x{})",
                        crop.x, crop.y, crop.width, crop.height
                    ),
                    Err(e) => println!("      → rejected: {e}"),
                }
            }
        }

        match compute_fallback_crop(width, height) {
            Ok(crop) => println!(
                "  → fallback crop:  ({}, {}, {}x{})",
                crop.x, crop.y, crop.width, crop.height
            ),
            Err(e) => println!("  → fallback failed: {e}"),
        }
        println!();
    }
}
