//! Background-subtraction motion detection.
//!
//! Frames are reduced to a small grayscale grid, compared against a running
//! average background and cleaned with a median filter. Motion is reported
//! when one 8-connected region of changed pixels, rescaled to source
//! resolution, covers at least `threshold` pixels.

use std::collections::VecDeque;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::filter::median_filter;
use imageproc::region_labelling::{connected_components, Connectivity};
use parking_lot::Mutex;

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// Per-camera motion check, run once per tick.
pub trait MotionDetection: Send {
    /// Returns true when the frame shows motion.
    fn detect(&mut self, frame: &Frame) -> MediaResult<bool>;

    /// Minimum region area (source pixels) that counts as motion.
    fn threshold(&self) -> u32;
}

/// Width of the analysis grid.
const PROC_WIDTH: u32 = 160;
/// Minimum per-pixel change against the background (0-255).
const PIXEL_DELTA: f32 = 25.0;
/// Background learning rate.
const LEARNING_RATE: f32 = 0.05;
/// Median filter radius (5x5 window).
const MEDIAN_RADIUS: u32 = 2;

/// Running-average background subtractor.
pub struct MotionDetector {
    threshold: u32,
    background: Option<Background>,
}

struct Background {
    source_size: (u32, u32),
    proc_size: (u32, u32),
    model: Vec<f32>,
}

impl MotionDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            background: None,
        }
    }

    fn proc_size(width: u32, height: u32) -> (u32, u32) {
        if width <= PROC_WIDTH {
            return (width.max(1), height.max(1));
        }
        let scale = PROC_WIDTH as f64 / width as f64;
        let h = ((height as f64 * scale).round() as u32).max(1);
        (PROC_WIDTH, h)
    }

    fn reduce(frame: &Frame, proc_size: (u32, u32)) -> GrayImage {
        let gray = imageops::grayscale(frame.image());
        if gray.dimensions() == proc_size {
            gray
        } else {
            imageops::resize(&gray, proc_size.0, proc_size.1, FilterType::Triangle)
        }
    }

    /// Binary mask of pixels that moved away from the background; updates
    /// the background in the same pass.
    fn foreground(background: &mut Background, gray: &GrayImage) -> GrayImage {
        let (w, h) = background.proc_size;
        let mut mask = GrayImage::new(w, h);
        for (i, (pixel, bg)) in gray.pixels().zip(background.model.iter_mut()).enumerate() {
            let value = pixel.0[0] as f32;
            if (value - *bg).abs() > PIXEL_DELTA {
                let x = i as u32 % w;
                let y = i as u32 / w;
                mask.put_pixel(x, y, Luma([255]));
            }
            *bg += (value - *bg) * LEARNING_RATE;
        }
        mask
    }

    fn largest_region(mask: &GrayImage) -> u64 {
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
        let mut areas: Vec<u64> = Vec::new();
        for label in labels.pixels() {
            let id = label.0[0] as usize;
            if id == 0 {
                continue;
            }
            if areas.len() < id {
                areas.resize(id, 0);
            }
            areas[id - 1] += 1;
        }
        areas.into_iter().max().unwrap_or(0)
    }
}

impl MotionDetection for MotionDetector {
    fn detect(&mut self, frame: &Frame) -> MediaResult<bool> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(MediaError::detection_failed("empty frame"));
        }

        let proc_size = Self::proc_size(width, height);
        let gray = Self::reduce(frame, proc_size);

        let background = match self.background.as_mut() {
            Some(bg) if bg.source_size == (width, height) => bg,
            _ => {
                // First frame or geometry change: prime only.
                self.background = Some(Background {
                    source_size: (width, height),
                    proc_size,
                    model: gray.pixels().map(|p| p.0[0] as f32).collect(),
                });
                return Ok(false);
            }
        };

        let mask = Self::foreground(background, &gray);
        let mask = median_filter(&mask, MEDIAN_RADIUS, MEDIAN_RADIUS);

        let scale = (width as f64 * height as f64) / (proc_size.0 as f64 * proc_size.1 as f64);
        let area = Self::largest_region(&mask) as f64 * scale;

        Ok(area >= self.threshold as f64)
    }

    fn threshold(&self) -> u32 {
        self.threshold
    }
}

/// Motion detector that replays queued answers; `false` once drained.
///
/// Clones share the queue so a test can keep a handle after the detector
/// has been moved into a slot.
#[derive(Clone, Default)]
pub struct ScriptedMotion {
    script: Arc<Mutex<VecDeque<MediaResult<bool>>>>,
}

impl ScriptedMotion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, motion: bool) {
        self.script.lock().push_back(Ok(motion));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .push_back(Err(MediaError::detection_failed(message)));
    }
}

impl MotionDetection for ScriptedMotion {
    fn detect(&mut self, _frame: &Frame) -> MediaResult<bool> {
        self.script.lock().pop_front().unwrap_or(Ok(false))
    }

    fn threshold(&self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame_with_block(x0: u32, size: u32, seq: u64) -> Frame {
        let mut img = RgbImage::from_pixel(320, 240, Rgb([10, 10, 10]));
        for y in 60..60 + size {
            for x in x0..x0 + size {
                img.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        Frame::new(img, seq)
    }

    #[test]
    fn first_frame_only_primes() {
        let mut detector = MotionDetector::new(1000);
        assert!(!detector.detect(&frame_with_block(20, 80, 1)).unwrap());
    }

    #[test]
    fn static_scene_has_no_motion() {
        let mut detector = MotionDetector::new(1000);
        for seq in 0..5 {
            assert!(!detector.detect(&Frame::filled(320, 240, [50, 50, 50], seq)).unwrap());
        }
    }

    #[test]
    fn large_block_triggers_motion() {
        let mut detector = MotionDetector::new(1000);
        detector.detect(&Frame::filled(320, 240, [10, 10, 10], 0)).unwrap();
        assert!(detector.detect(&frame_with_block(100, 80, 1)).unwrap());
    }

    #[test]
    fn small_block_stays_below_threshold() {
        let mut detector = MotionDetector::new(1000);
        detector.detect(&Frame::filled(320, 240, [10, 10, 10], 0)).unwrap();
        // 20x20 = 400 source pixels
        assert!(!detector.detect(&frame_with_block(100, 20, 1)).unwrap());
    }

    #[test]
    fn geometry_change_reprimes() {
        let mut detector = MotionDetector::new(10);
        detector.detect(&Frame::filled(320, 240, [10, 10, 10], 0)).unwrap();
        assert!(!detector.detect(&Frame::filled(640, 480, [250, 250, 250], 1)).unwrap());
    }

    #[test]
    fn scripted_motion_replays_then_defaults() {
        let script = ScriptedMotion::new();
        let mut detector = script.clone();
        script.push(true);
        script.push_error("boom");

        let frame = Frame::filled(4, 4, [0, 0, 0], 0);
        assert!(detector.detect(&frame).unwrap());
        assert!(detector.detect(&frame).is_err());
        assert!(!detector.detect(&frame).unwrap());
    }
}
