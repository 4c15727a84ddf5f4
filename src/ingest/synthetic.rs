//! Synthetic frames for `stub://` devices.

use anyhow::Result;

use super::FrameSource;
use crate::frame::Frame;

/// Endless diagonal gradient that drifts one step per frame.
pub struct SyntheticSource {
    label: String,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            frame_count: 0,
        }
    }

    pub fn frames_generated(&self) -> u64 {
        self.frame_count
    }

    pub fn capture(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let width = self.width as usize;
        let height = self.height as usize;
        let mut pixels = vec![0u8; width * height * 3];
        for y in 0..height {
            for x in 0..width {
                let offset = (y * width + x) * 3;
                let value = ((x + y) as u64 + self.frame_count) % 256;
                pixels[offset] = value as u8;
                pixels[offset + 1] = (255 - value) as u8;
                pixels[offset + 2] = (y % 256) as u8;
            }
        }
        Frame::from_rgb(pixels, self.width, self.height)
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.capture().map(Some)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
