//! JPEG encoding for live streams.

use image::codecs::jpeg::JpegEncoder;

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Encode a frame as a baseline JPEG. Quality is clamped to 1..=100.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> MediaResult<Vec<u8>> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(MediaError::encode_failed("empty frame"));
    }

    let mut buffer = Vec::with_capacity(width as usize * height as usize / 4);
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder
        .encode_image(frame.image())
        .map_err(|e| MediaError::encode_failed(e.to_string()))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_jpeg_markers() {
        let frame = Frame::filled(32, 24, [200, 10, 10], 0);
        let jpeg = encode_jpeg(&frame, DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn empty_frame_fails() {
        let frame = Frame::new(image::RgbImage::new(0, 0), 0);
        assert!(matches!(
            encode_jpeg(&frame, 50),
            Err(MediaError::EncodeFailed(_))
        ));
    }
}
