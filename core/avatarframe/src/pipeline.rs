use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageEncoder, Luma, RgbaImage};

use crate::background::remove_with_deadline;
use crate::crop::{square_up, CropRegion};
use crate::error::{AvatarError, PipelineError, Stage};
use crate::face_detector::{detect_faces, select_best, FaceBounds};
use crate::{AvatarMetadata, AvatarProcessor, CropSource, OutputFormat, ProcessedAvatar};

/// Sigma of the blur softening alpha edges after background removal.
const ALPHA_SMOOTHING_SIGMA: f32 = 0.5;

/// Decode input bytes into a `DynamicImage`.
pub(crate) fn decode_image(input: &[u8]) -> Result<DynamicImage, AvatarError> {
    image::load_from_memory(input).map_err(|e| AvatarError::DecodeError(e.to_string()))
}

/// Copy `region` out of `image`.
pub(crate) fn extract(image: &RgbaImage, region: CropRegion) -> Result<RgbaImage, AvatarError> {
    let (img_w, img_h) = image.dimensions();
    if region.width == 0
        || region.height == 0
        || region.right() > img_w
        || region.bottom() > img_h
    {
        return Err(AvatarError::CropOutOfBounds {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            image_width: img_w,
            image_height: img_h,
        });
    }
    Ok(image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

/// Scale to `size` × `size`, first padding a non-square image with
/// transparent pixels so it is centered without distortion.
///
/// An image that is already `size` × `size` is returned unchanged.
pub(crate) fn resize_to_square(image: &RgbaImage, size: u32) -> RgbaImage {
    let (w, h) = image.dimensions();
    if (w, h) == (size, size) {
        return image.clone();
    }

    let squared = if w == h {
        image.clone()
    } else {
        let side = w.max(h);
        let mut canvas = RgbaImage::new(side, side);
        image::imageops::overlay(
            &mut canvas,
            image,
            ((side - w) / 2) as i64,
            ((side - h) / 2) as i64,
        );
        canvas
    };

    image::imageops::resize(&squared, size, size, FilterType::Lanczos3)
}

/// Soften the alpha channel so cut-out edges do not look jagged.
pub(crate) fn smooth_alpha(image: &RgbaImage) -> RgbaImage {
    let alpha = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[3]])
    });
    let soft = image::imageops::blur(&alpha, ALPHA_SMOOTHING_SIGMA);

    let mut out = image.clone();
    for (px, a) in out.pixels_mut().zip(soft.pixels()) {
        px[3] = a[0];
    }
    out
}

/// Encode an RGBA avatar. Both formats keep the alpha channel.
pub(crate) fn encode_image(image: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>, AvatarError> {
    let mut buffer = Vec::new();
    let (width, height) = image.dimensions();

    match format {
        OutputFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buffer, CompressionType::Default, PngFilter::Adaptive);
            encoder
                .write_image(image.as_raw(), width, height, image::ExtendedColorType::Rgba8)
                .map_err(|e| AvatarError::EncodeError(e.to_string()))?;
        }
        OutputFormat::Webp => {
            // The pure-Rust image-webp crate only supports lossless encoding.
            let encoder = WebPEncoder::new_lossless(&mut buffer);
            encoder
                .write_image(image.as_raw(), width, height, image::ExtendedColorType::Rgba8)
                .map_err(|e| AvatarError::EncodeError(e.to_string()))?;
        }
    }

    Ok(buffer)
}

/// Outcome of the Detecting and crop-selection steps.
struct Framing {
    region: CropRegion,
    source: CropSource,
    face: Option<FaceBounds>,
    pass: Option<&'static str>,
}

/// Detect → crop → (remove background) → enhance → resize → encode.
pub(crate) fn run_pipeline(
    processor: &AvatarProcessor,
    decoded: &DynamicImage,
    input_bytes: usize,
) -> Result<ProcessedAvatar, PipelineError> {
    let (img_w, img_h) = (decoded.width(), decoded.height());
    if img_w == 0 || img_h == 0 {
        return Err(PipelineError::at(Stage::Decoding)(AvatarError::ZeroDimensions));
    }
    if processor.output_size == 0 {
        return Err(PipelineError::at(Stage::Resizing)(AvatarError::InvalidOutputSize));
    }

    let framing = frame(processor, decoded).map_err(PipelineError::at(Stage::Cropping))?;

    let source = decoded.to_rgba8();
    let (framing, cropped) = match extract(&source, framing.region) {
        Ok(cropped) => (framing, cropped),
        Err(err) if framing.source == CropSource::Face => {
            tracing::warn!(error = %err, "face crop could not be extracted, retrying with portrait fallback");
            let region = processor
                .framing
                .fallback_crop(img_w, img_h)
                .map_err(PipelineError::at(Stage::Cropping))?;
            let cropped = extract(&source, region).map_err(PipelineError::at(Stage::Cropping))?;
            (
                Framing {
                    region,
                    source: CropSource::Fallback,
                    ..framing
                },
                cropped,
            )
        }
        Err(err) => return Err(PipelineError::at(Stage::Cropping)(err)),
    };

    let (subject, background_removed) = match (&processor.remover, processor.background_removal) {
        (Some(remover), true) => {
            match remove_with_deadline(remover, &cropped, processor.background_timeout) {
                Ok(cutout) => (cutout, true),
                Err(err) => {
                    tracing::warn!(error = %err, "background removal skipped");
                    (cropped, false)
                }
            }
        }
        _ => (cropped, false),
    };

    let enhanced = processor.enhancement.apply(&subject);

    let mut avatar = resize_to_square(&enhanced, processor.output_size);
    if background_removed {
        avatar = smooth_alpha(&avatar);
    }

    let data = encode_image(&avatar, processor.format).map_err(PipelineError::at(Stage::Encoding))?;

    let metadata = AvatarMetadata {
        face_detected: framing.face.is_some(),
        crop_source: framing.source,
        final_size: avatar.dimensions(),
        original_size: (img_w, img_h),
        input_bytes,
        crop_region: framing.region,
        face_bounds: framing.face,
        detection_pass: framing.pass,
        background_removed,
        enhanced: true,
    };

    tracing::info!(
        face_detected = metadata.face_detected,
        crop_source = ?metadata.crop_source,
        background_removed,
        size = processor.output_size,
        "avatar processed"
    );

    Ok(ProcessedAvatar {
        image: avatar,
        data,
        format: processor.format,
        metadata,
    })
}

/// Run detection and choose the crop region.
///
/// A geometrically invalid face box counts as no face. A valid face whose
/// crop cannot be built under the framing profile keeps `face` set but falls
/// back to portrait geometry.
fn frame(processor: &AvatarProcessor, image: &DynamicImage) -> Result<Framing, AvatarError> {
    let (img_w, img_h) = (image.width(), image.height());

    let candidates = match (&processor.detector, processor.auto_crop) {
        (Some(detector), true) => {
            let gray = image::imageops::grayscale(image);
            detect_faces(
                &**detector,
                gray.as_raw(),
                img_w,
                img_h,
                &processor.detection_passes,
            )
        }
        _ => Vec::new(),
    };

    if let Some(best) = select_best(&candidates, processor.selection_policy, img_w, img_h) {
        match processor.framing.crop_from_face(&best.bounds, img_w, img_h) {
            Ok(region) => {
                return Ok(Framing {
                    region: square_up(region, img_w, img_h),
                    source: CropSource::Face,
                    face: Some(best.bounds.clone()),
                    pass: Some(best.pass_name),
                });
            }
            Err(err @ AvatarError::InvalidDetection { .. }) => {
                tracing::warn!(error = %err, "discarding invalid face detection");
            }
            Err(err) => {
                tracing::warn!(error = %err, "face crop rejected, using portrait fallback");
                return Ok(Framing {
                    region: processor.framing.fallback_crop(img_w, img_h)?,
                    source: CropSource::Fallback,
                    face: Some(best.bounds.clone()),
                    pass: Some(best.pass_name),
                });
            }
        }
    }

    Ok(Framing {
        region: processor.framing.fallback_crop(img_w, img_h)?,
        source: CropSource::Fallback,
        face: None,
        pass: None,
    })
}
