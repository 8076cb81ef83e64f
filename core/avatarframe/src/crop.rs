use serde::Serialize;

use crate::error::AvatarError;
use crate::face_detector::FaceBounds;

/// Crop region within the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRegion {
    /// Left edge (pixels).
    pub x: u32,
    /// Top edge (pixels).
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether `face` lies entirely inside this region.
    pub fn contains(&self, face: &FaceBounds) -> bool {
        face.x >= self.x as f64
            && face.y >= self.y as f64
            && face.x + face.width <= self.right() as f64
            && face.y + face.height <= self.bottom() as f64
    }

    fn out_of_bounds(self, image_width: u32, image_height: u32) -> AvatarError {
        AvatarError::CropOutOfBounds {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            image_width,
            image_height,
        }
    }
}

/// Numeric framing policy for portrait avatars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramingProfile {
    /// Padding added on every side, as a multiple of the face's larger edge.
    pub padding_factor: f64,
    /// Upward shift of the padded box, as a fraction of the face height.
    pub vertical_shift: f64,
    /// Smallest acceptable face crop edge, as a fraction of the image's
    /// smaller dimension.
    pub min_crop_fraction: f64,
    /// Where the fallback crop of a portrait image starts, as a fraction of
    /// the image height.
    pub portrait_top_offset: f64,
}

impl FramingProfile {
    /// Head, hair and shoulders framing.
    pub const PORTRAIT: FramingProfile = FramingProfile {
        padding_factor: 1.2,
        vertical_shift: 0.1,
        min_crop_fraction: 0.3,
        portrait_top_offset: 0.1,
    };

    /// Compute the crop around a detected face.
    ///
    /// The face box is padded by `padding_factor × max(width, height)` on all
    /// sides, shifted up by `vertical_shift × height`, then clamped to the
    /// image. A crop whose edge would fall below `min_crop_fraction` of the
    /// image's shorter side is grown around the face to that size. The result
    /// always contains the face box; it is not necessarily square.
    pub fn crop_from_face(
        &self,
        face: &FaceBounds,
        image_width: u32,
        image_height: u32,
    ) -> Result<CropRegion, AvatarError> {
        validate_face(face, image_width, image_height)?;

        let (img_w, img_h) = (image_width as f64, image_height as f64);
        let face_right = face.x + face.width;
        let face_bottom = face.y + face.height;

        let padding = face.width.max(face.height) * self.padding_factor;
        let shift = face.height * self.vertical_shift;

        let left = (face.x - padding).max(0.0).floor();
        let top = (face.y - padding - shift).max(0.0).floor();
        let right = (face_right + padding).min(img_w).ceil();
        let bottom = (face_bottom + padding - shift).min(img_h).ceil();

        // Never cut into the face, whatever the clamp did.
        let left = left.min(face.x.floor());
        let top = top.min(face.y.floor());
        let right = right.max(face_right.ceil()).min(img_w);
        let bottom = bottom.max(face_bottom.ceil()).min(img_h);

        let region = CropRegion {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        };

        let short_side = image_width.min(image_height) as f64;
        let min_edge = ((short_side * self.min_crop_fraction).floor() as u32).max(1);
        if min_edge > image_width || min_edge > image_height {
            return Err(region.out_of_bounds(image_width, image_height));
        }

        let (x, width) = widen(region.x, region.width, min_edge, image_width);
        let (y, height) = widen(region.y, region.height, min_edge, image_height);
        Ok(CropRegion {
            x,
            y,
            width,
            height,
        })
    }

    /// Compute a square crop from the image dimensions alone.
    ///
    /// Portrait images (taller than wide) keep the full width and start
    /// `portrait_top_offset` down from the top, sliding up only if the square
    /// would overrun the bottom edge. Landscape and square images get a
    /// centered square.
    pub fn fallback_crop(
        &self,
        image_width: u32,
        image_height: u32,
    ) -> Result<CropRegion, AvatarError> {
        if image_width == 0 || image_height == 0 {
            return Err(CropRegion {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            }
            .out_of_bounds(image_width, image_height));
        }

        if image_height > image_width {
            let size = image_width;
            let mut top = (image_height as f64 * self.portrait_top_offset).ceil() as u32;
            if top + size > image_height {
                top = image_height - size;
            }
            Ok(CropRegion {
                x: 0,
                y: top,
                width: size,
                height: size,
            })
        } else {
            let size = image_height;
            Ok(CropRegion {
                x: (image_width - size) / 2,
                y: 0,
                width: size,
                height: size,
            })
        }
    }
}

/// [`FramingProfile::crop_from_face`] with the portrait profile.
pub fn compute_crop_from_face(
    face: &FaceBounds,
    image_width: u32,
    image_height: u32,
) -> Result<CropRegion, AvatarError> {
    FramingProfile::PORTRAIT.crop_from_face(face, image_width, image_height)
}

/// [`FramingProfile::fallback_crop`] with the portrait profile.
pub fn compute_fallback_crop(
    image_width: u32,
    image_height: u32,
) -> Result<CropRegion, AvatarError> {
    FramingProfile::PORTRAIT.fallback_crop(image_width, image_height)
}

/// Stretch the span `[start, start + len)` to at least `min` around its
/// middle, shifted back inside `[0, limit)`. Requires `min <= limit`.
fn widen(start: u32, len: u32, min: u32, limit: u32) -> (u32, u32) {
    if len >= min {
        return (start, len);
    }
    let start = start.saturating_sub((min - len) / 2).min(limit - min);
    (start, min)
}

/// Grow the shorter side of `region` toward a square, symmetrically and
/// within the image. The result always contains `region`.
pub fn square_up(region: CropRegion, image_width: u32, image_height: u32) -> CropRegion {
    let CropRegion {
        mut x,
        mut y,
        mut width,
        mut height,
    } = region;

    if width < height {
        let grow = height - width;
        width = height.min(image_width);
        x = x.saturating_sub(grow / 2).min(image_width - width);
    } else if height < width {
        let grow = width - height;
        height = width.min(image_height);
        y = y.saturating_sub(grow / 2).min(image_height - height);
    }

    CropRegion {
        x,
        y,
        width,
        height,
    }
}

pub(crate) fn validate_face(face: &FaceBounds, image_width: u32, image_height: u32) -> Result<(), AvatarError> {
    let finite = [face.x, face.y, face.width, face.height]
        .iter()
        .all(|v| v.is_finite());
    let valid = finite
        && face.width > 0.0
        && face.height > 0.0
        && face.x >= 0.0
        && face.y >= 0.0
        && face.x + face.width <= image_width as f64
        && face.y + face.height <= image_height as f64;

    if valid {
        Ok(())
    } else {
        Err(AvatarError::InvalidDetection {
            x: face.x,
            y: face.y,
            width: face.width,
            height: face.height,
            image_width,
            image_height,
        })
    }
}
