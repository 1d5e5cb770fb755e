//! Fitting rendered images to the output resolution.
//!
//! Images are never stretched: the aspect ratio is kept and the mismatch is
//! absorbed either by bars (letterbox) or by a center crop.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb, RgbImage};
use tracing::debug;

use crate::config::FitPolicy;
use crate::error::ArtifactError;
use crate::video::types::Frame;

/// Decode encoded image bytes (PNG / JPEG) into an RGB buffer
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ArtifactError> {
    if bytes.is_empty() {
        return Err(ArtifactError::EmptyImage);
    }

    let image = image::load_from_memory(bytes).map_err(|e| ArtifactError::ImageDecodeFailed {
        reason: e.to_string(),
    })?;

    let rgb = match image {
        image::DynamicImage::ImageRgb8(img) => img,
        other => other.to_rgb8(),
    };

    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(ArtifactError::InvalidImageDimensions {
            width: rgb.width(),
            height: rgb.height(),
        });
    }

    Ok(rgb)
}

/// Bring an image to exactly `width` x `height` under the given policy
pub fn fit_image(image: RgbImage, width: u32, height: u32, policy: FitPolicy, background: [u8; 3]) -> Frame {
    if image.dimensions() == (width, height) {
        return Frame::new(image);
    }

    debug!(
        "Fitting {}x{} image into {}x{} ({:?})",
        image.width(),
        image.height(),
        width,
        height,
        policy
    );

    match policy {
        FitPolicy::Letterbox => letterbox(&image, width, height, background),
        FitPolicy::Crop => cover_crop(&image, width, height),
    }
}

/// Largest size with the source aspect ratio that fits inside the target
fn contained_size(src: (u32, u32), dst: (u32, u32)) -> (u32, u32) {
    let scale = f64::min(dst.0 as f64 / src.0 as f64, dst.1 as f64 / src.1 as f64);
    let w = ((src.0 as f64 * scale).round() as u32).clamp(1, dst.0);
    let h = ((src.1 as f64 * scale).round() as u32).clamp(1, dst.1);
    (w, h)
}

/// Smallest size with the source aspect ratio that covers the target
fn covering_size(src: (u32, u32), dst: (u32, u32)) -> (u32, u32) {
    let scale = f64::max(dst.0 as f64 / src.0 as f64, dst.1 as f64 / src.1 as f64);
    let w = ((src.0 as f64 * scale).round() as u32).max(dst.0);
    let h = ((src.1 as f64 * scale).round() as u32).max(dst.1);
    (w, h)
}

fn letterbox(image: &RgbImage, width: u32, height: u32, background: [u8; 3]) -> Frame {
    let (w, h) = contained_size(image.dimensions(), (width, height));
    let resized = imageops::resize(image, w, h, FilterType::Lanczos3);

    let mut canvas: RgbImage = ImageBuffer::from_pixel(width, height, Rgb(background));
    let x = (width - w) / 2;
    let y = (height - h) / 2;
    imageops::replace(&mut canvas, &resized, x as i64, y as i64);

    Frame::new(canvas)
}

fn cover_crop(image: &RgbImage, width: u32, height: u32) -> Frame {
    let (w, h) = covering_size(image.dimensions(), (width, height));
    let resized = imageops::resize(image, w, h, FilterType::Lanczos3);

    let x = (w - width) / 2;
    let y = (h - height) / 2;
    Frame::new(imageops::crop_imm(&resized, x, y, width, height).to_image())
}
