use image::{Rgb, RgbImage};

use super::FrameSource;
use crate::error::MediaResult;
use crate::frame::Frame;

const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);
const BLOCK: Rgb<u8> = Rgb([230, 230, 230]);

/// Synthetic camera: a bright block sweeping across a dark background.
///
/// Every read produces a new frame. With motion disabled the block stays
/// put, which the motion detector sees as a static scene.
pub struct TestPatternSource {
    name: String,
    width: u32,
    height: u32,
    moving: bool,
    seq: u64,
    open: bool,
}

impl TestPatternSource {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width: width.max(1),
            height: height.max(1),
            moving: true,
            seq: 0,
            open: true,
        }
    }

    pub fn with_motion(mut self, moving: bool) -> Self {
        self.moving = moving;
        self
    }

    fn render(&self) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let size = (self.width.min(self.height) / 4).max(1);
        let travel = self.width.saturating_sub(size).max(1) as u64;
        let step = if self.moving { self.seq * 8 } else { 0 };
        let x0 = (step % travel) as u32;
        let y0 = (self.height - size) / 2;
        for y in y0..y0 + size {
            for x in x0..(x0 + size).min(self.width) {
                img.put_pixel(x, y, BLOCK);
            }
        }
        img
    }
}

impl FrameSource for TestPatternSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.open
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        self.seq += 1;
        Ok(Some(Frame::new(self.render(), self.seq)))
    }

    fn reconnect(&mut self) -> MediaResult<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_moves_between_frames() {
        let mut source = TestPatternSource::new("pattern", 160, 120);
        let a = source.read_frame().unwrap().unwrap();
        let b = source.read_frame().unwrap().unwrap();
        assert_eq!(b.seq(), a.seq() + 1);
        assert_ne!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn static_pattern_repeats() {
        let mut source = TestPatternSource::new("pattern", 160, 120).with_motion(false);
        let a = source.read_frame().unwrap().unwrap();
        let b = source.read_frame().unwrap().unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
