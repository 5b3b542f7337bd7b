//! Vision/OCR Layer
//!
//! Finds text regions in captured frames. The pipeline only depends on the
//! `TextDetector` trait; `OcrsDetector` is the bundled backend.

pub mod models;
pub mod ocr;

use anyhow::Result;

use crate::capture::frame::CapturedFrame;

pub use models::{ModelManager, ModelType};
pub use ocr::OcrsDetector;

/// Detected text region
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Corner points in order, starting at the top-left corner
    pub polygon: Vec<(f32, f32)>,
    /// Recognized text
    pub text: String,
}

impl Detection {
    /// Create a detection from its corner points and text
    pub fn new(polygon: Vec<(f32, f32)>, text: impl Into<String>) -> Self {
        Self {
            polygon,
            text: text.into(),
        }
    }
}

/// Finds text in a frame
///
/// Returns an empty vec, not an error, when the frame holds no text. Each text
/// instance is reported once.
pub trait TextDetector: Send + Sync {
    fn detect(&self, frame: &CapturedFrame) -> Result<Vec<Detection>>;
}

/// Convert polygon points to bounding box (x, y, width, height)
pub fn polygon_to_bounds(polygon: &[(f32, f32)]) -> (u32, u32, u32, u32) {
    if polygon.is_empty() {
        return (0, 0, 0, 0);
    }

    let min_x = polygon.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let min_y = polygon.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
    let max_x = polygon.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
    let max_y = polygon.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

    (
        min_x.max(0.0) as u32,
        min_y.max(0.0) as u32,
        (max_x - min_x).max(0.0) as u32,
        (max_y - min_y).max(0.0) as u32,
    )
}

/// Top-left anchor of a text region
///
/// A quadrilateral keeps its own first corner (rotated text stays anchored to
/// its glyphs); anything else falls back to the bounding box corner.
pub fn polygon_anchor(polygon: &[(f32, f32)]) -> (i32, i32) {
    match polygon {
        [first, _, _, _] if first.0.is_finite() && first.1.is_finite() => {
            (first.0.round() as i32, first.1.round() as i32)
        }
        _ => {
            let (x, y, _, _) = polygon_to_bounds(polygon);
            (x as i32, y as i32)
        }
    }
}

/// Reorder corner points so the top-left-most corner comes first
///
/// Keeps the winding order; only the starting point moves.
pub fn rotate_to_top_left(mut corners: Vec<(f32, f32)>) -> Vec<(f32, f32)> {
    if let Some(start) = corners
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.0 + a.1).total_cmp(&(b.0 + b.1)))
        .map(|(i, _)| i)
    {
        corners.rotate_left(start);
    }
    corners
}
