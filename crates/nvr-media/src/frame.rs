//! Captured video frames.

use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage};

use crate::error::{MediaError, MediaResult};

/// One RGB frame pulled from a camera.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    seq: u64,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(image: RgbImage, seq: u64) -> Self {
        Self {
            image,
            seq,
            captured_at: Utc::now(),
        }
    }

    /// Build a frame from packed RGB24 bytes.
    pub fn from_rgb24(width: u32, height: u32, data: Vec<u8>, seq: u64) -> MediaResult<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(MediaError::internal(format!(
                "Invalid frame data length: expected {}, got {}",
                expected,
                data.len()
            )));
        }
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| MediaError::internal("Failed to create frame buffer"))?;
        Ok(Self::new(image, seq))
    }

    /// Frame of a single colour.
    pub fn filled(width: u32, height: u32, color: [u8; 3], seq: u64) -> Self {
        Self::new(RgbImage::from_pixel(width, height, Rgb(color)), seq)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Sequence number assigned by the source, increasing per camera.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Packed RGB24 bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffers() {
        assert!(Frame::from_rgb24(4, 4, vec![0; 47], 1).is_err());
        let frame = Frame::from_rgb24(4, 4, vec![7; 48], 1).unwrap();
        assert_eq!(frame.dimensions(), (4, 4));
        assert_eq!(frame.as_raw()[0], 7);
    }
}
