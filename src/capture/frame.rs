//! Frame data structures for captured video content

use image::{DynamicImage, RgbImage, RgbaImage};
use std::time::Instant;

/// A captured frame from a video source
///
/// Pixels are stored as RGBA, whatever the source format was at capture time.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGBA pixel buffer (height x width x 4)
    pub image: RgbaImage,
    /// Position of this frame in the capture order
    pub index: u64,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: RgbaImage, index: u64) -> Self {
        Self {
            image,
            index,
            timestamp: Instant::now(),
        }
    }

    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Copy of the frame as packed RGB, the layout OCR engines expect
    pub fn to_rgb(&self) -> RgbImage {
        DynamicImage::ImageRgba8(self.image.clone()).to_rgb8()
    }
}
