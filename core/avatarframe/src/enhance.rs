//! Deterministic portrait enhancement chain.
//!
//! Filters run in a fixed order: unsharp mask, contrast, saturation,
//! brightness. Each takes the previous filter's output and returns a new
//! buffer; alpha is carried through untouched.

use image::{Rgba, RgbaImage};

/// Filter strengths for the enhancement chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancementSettings {
    /// Gaussian sigma of the unsharp mask blur.
    pub sharpen_radius: f32,
    /// Unsharp mask strength in percent of the high-pass signal.
    pub sharpen_percent: f32,
    /// Minimum per-channel difference the unsharp mask acts on.
    pub sharpen_threshold: u8,
    /// Contrast factor around the mean luminance (1.0 = unchanged).
    pub contrast: f32,
    /// Saturation factor against per-pixel luminance (1.0 = unchanged).
    pub saturation: f32,
    /// Brightness factor (1.0 = unchanged).
    pub brightness: f32,
}

impl EnhancementSettings {
    /// Gentle settings tuned to avoid harsh skin texture and contrast.
    pub const PORTRAIT: EnhancementSettings = EnhancementSettings {
        sharpen_radius: 0.8,
        sharpen_percent: 110.0,
        sharpen_threshold: 3,
        contrast: 1.08,
        saturation: 1.03,
        brightness: 1.02,
    };

    /// Run the full chain on `image`.
    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let out = unsharp_mask(
            image,
            self.sharpen_radius,
            self.sharpen_percent,
            self.sharpen_threshold,
        );
        let out = adjust_contrast(&out, self.contrast);
        let out = adjust_saturation(&out, self.saturation);
        adjust_brightness(&out, self.brightness)
    }
}

impl Default for EnhancementSettings {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

/// Apply the portrait enhancement chain.
pub fn enhance(image: &RgbaImage) -> RgbaImage {
    EnhancementSettings::PORTRAIT.apply(image)
}

/// ITU-R 601-2 luma in fixed point.
fn luma(px: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = px.0;
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Blend every color channel toward `degenerate(px)` by `factor`:
/// `out = d + factor × (c - d)`.
fn blend_with<F>(image: &RgbaImage, factor: f32, degenerate: F) -> RgbaImage
where
    F: Fn(&Rgba<u8>) -> f32,
{
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let d = degenerate(px);
        for channel in px.0.iter_mut().take(3) {
            *channel = to_channel(d + factor * (*channel as f32 - d));
        }
    }
    out
}

fn unsharp_mask(image: &RgbaImage, radius: f32, percent: f32, threshold: u8) -> RgbaImage {
    if radius <= 0.0 || percent <= 0.0 {
        return image.clone();
    }

    let blurred = image::imageops::blur(image, radius);
    let amount = percent / 100.0;
    let mut out = image.clone();

    for (px, soft) in out.pixels_mut().zip(blurred.pixels()) {
        for (channel, &b) in px.0.iter_mut().zip(soft.0.iter()).take(3) {
            let diff = *channel as i16 - b as i16;
            if diff.unsigned_abs() >= threshold as u16 {
                *channel = to_channel(*channel as f32 + diff as f32 * amount);
            }
        }
    }
    out
}

fn adjust_contrast(image: &RgbaImage, factor: f32) -> RgbaImage {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return image.clone();
    }
    let sum: u64 = image.pixels().map(|px| luma(px) as u64).sum();
    let mean = (sum as f64 / count as f64).round() as f32;
    blend_with(image, factor, |_| mean)
}

fn adjust_saturation(image: &RgbaImage, factor: f32) -> RgbaImage {
    blend_with(image, factor, |px| luma(px) as f32)
}

fn adjust_brightness(image: &RgbaImage, factor: f32) -> RgbaImage {
    blend_with(image, factor, |_| 0.0)
}
