//! Immutable frames.
//!
//! A `Frame` is an RGB pixel grid that lives for exactly one detection cycle.
//! Pixel bytes are private and read-only; there is no mutable accessor, so a
//! frame handed to a detector is the frame that gets rendered.

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, RgbImage};

/// Bytes per pixel. Frames are always packed RGB.
pub const CHANNELS: u32 = 3;

/// Immutable packed-RGB frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap packed RGB bytes. The byte count must be `width * height * 3`.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self::from_rgb_image(image.into_rgb8())
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
        }
    }

    /// Decode an encoded image (JPEG, PNG, GIF) into a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("decode frame image")?;
        Ok(Self::from_image(image))
    }

    /// Load an image file from disk.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?;
        Ok(Self::from_image(image))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        CHANNELS
    }

    /// Read-only view of the packed RGB bytes (row-major, HWC).
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// RGB triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * CHANNELS as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Copy into an `image` buffer for drawing or encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        // Length is validated at construction, so this cannot fail.
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Return a copy scaled to `width` x `height`.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let scaled = image::imageops::resize(
            &self.to_rgb_image(),
            width,
            height,
            image::imageops::FilterType::Triangle,
        );
        Self::from_rgb_image(scaled)
    }

    /// Consume the frame and hand back the raw bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS as usize))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_validates_length() {
        assert!(Frame::from_rgb(vec![0u8; 12], 2, 2).is_ok());
        assert!(Frame::from_rgb(vec![0u8; 11], 2, 2).is_err());
    }

    #[test]
    fn pixel_lookup_is_row_major() -> Result<()> {
        let data = vec![
            1, 2, 3, 4, 5, 6, //
            7, 8, 9, 10, 11, 12,
        ];
        let frame = Frame::from_rgb(data, 2, 2)?;
        assert_eq!(frame.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(frame.pixel(0, 1), Some([7, 8, 9]));
        assert_eq!(frame.pixel(2, 0), None);
        Ok(())
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Frame::decode(b"definitely not an image").is_err());
    }

    #[test]
    fn resized_changes_dimensions() -> Result<()> {
        let frame = Frame::from_rgb(vec![128u8; 4 * 4 * 3], 4, 4)?;
        let small = frame.resized(2, 2);
        assert_eq!((small.width(), small.height()), (2, 2));
        assert_eq!(small.pixels().len(), 12);
        Ok(())
    }
}
