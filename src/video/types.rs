use image::{ImageBuffer, Rgb, RgbImage};
use rayon::prelude::*;

/// Represents a single video frame
///
/// A thin wrapper around an RGB image buffer. Every frame handed to the
/// encoder has the configured output resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::new(width, height),
        }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            buffer: ImageBuffer::from_pixel(width, height, Rgb(color)),
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw packed RGB24 bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Linear blend: `alpha = 0` is `self`, `alpha = 1` is `other`.
    ///
    /// Returns `None` when the frames differ in size.
    pub fn blend(&self, other: &Frame, alpha: f32) -> Option<Frame> {
        if self.dimensions() != other.dimensions() {
            return None;
        }

        let alpha = alpha.clamp(0.0, 1.0);
        let inverse = 1.0 - alpha;
        let mut data = vec![0u8; self.buffer.as_raw().len()];

        data.par_chunks_mut(4096)
            .zip(self.buffer.as_raw().par_chunks(4096))
            .zip(other.buffer.as_raw().par_chunks(4096))
            .for_each(|((out, a), b)| {
                for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                    *o = (x as f32 * inverse + y as f32 * alpha).round() as u8;
                }
            });

        Frame::from_rgb_bytes(self.width(), self.height(), data)
    }

    /// Scale every channel by `factor` (0 = black, 1 = unchanged)
    pub fn scale_brightness(&mut self, factor: f32) {
        let factor = factor.clamp(0.0, 1.0);
        if factor >= 1.0 {
            return;
        }

        let raw: &mut [u8] = &mut self.buffer;
        raw.par_chunks_mut(4096).for_each(|chunk| {
            for value in chunk {
                *value = (*value as f32 * factor).round() as u8;
            }
        });
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_endpoints_and_midpoint() {
        let black = Frame::new_filled(4, 2, [0, 0, 0]);
        let white = Frame::new_filled(4, 2, [200, 100, 50]);

        assert_eq!(black.blend(&white, 0.0).unwrap(), black);
        assert_eq!(black.blend(&white, 1.0).unwrap(), white);
        assert_eq!(black.blend(&white, 0.5).unwrap().get_pixel(3, 1), [100, 50, 25]);
    }

    #[test]
    fn test_blend_rejects_size_mismatch() {
        let a = Frame::new_black(4, 4);
        let b = Frame::new_black(2, 2);
        assert!(a.blend(&b, 0.5).is_none());
    }

    #[test]
    fn test_scale_brightness() {
        let mut frame = Frame::new_filled(2, 2, [200, 100, 0]);
        frame.scale_brightness(0.5);
        assert_eq!(frame.get_pixel(0, 0), [100, 50, 0]);

        frame.scale_brightness(0.0);
        assert_eq!(frame, Frame::new_black(2, 2));
    }

    #[test]
    fn test_raw_bytes_roundtrip_size() {
        let frame = Frame::new_filled(3, 2, [1, 2, 3]);
        assert_eq!(frame.as_rgb_bytes().len(), 3 * 2 * 3);
        assert!(Frame::from_rgb_bytes(3, 2, vec![0; 5]).is_none());
    }
}
