//! Overlay Presentation Layer
//!
//! Draws translated text back onto captured frames. Every detection gets a
//! background box placed just above its text region so the source glyphs stay
//! visible; boxes are clamped into the frame, never drawn off-canvas.

pub mod style;

use ab_glyph::{FontArc, PxScale};
use anyhow::Result;
use image::Rgba;
use thiserror::Error;
use tracing::debug;

use crate::capture::frame::CapturedFrame;
use crate::config::{LabelAnchor, OverlaySettings};
use crate::vision::polygon_anchor;

pub use style::{load_font, OverlayStyle};
#[cfg(test)]
pub(crate) use style::test_font;

/// Rendering failures. These never fail a frame; the caller logs and moves on.
#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    /// No part of the overlay fits in the frame (e.g. a zero-sized frame)
    #[error("overlay does not fit in a {width}x{height} frame")]
    OutOfFrame { width: u32, height: u32 },
}

/// Axis-aligned rectangle in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl OverlayRect {
    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Placement of one translated text
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    /// Top-left corner of the source text region, as detected
    ///
    /// Not clamped: it may lie outside the frame. Use `origin` for where the
    /// overlay is actually drawn.
    pub anchor: (i32, i32),
    /// Text to draw
    pub text: String,
    /// Upper-cased code of the language `text` is in
    pub language_label: String,
    /// Clamped background box; `None` when nothing fits in the frame
    pub background: Option<OverlayRect>,
}

impl OverlaySpec {
    /// Clamped top-left corner of the drawn overlay, always inside the frame
    pub fn origin(&self) -> Option<(u32, u32)> {
        self.background.map(|rect| (rect.x, rect.y))
    }
}

/// Clamp a rectangle into a `frame_w` x `frame_h` frame
///
/// Rectangles larger than the frame are shrunk to it; positions are shifted
/// so the whole rectangle stays inside.
pub fn clamp_rect(x: i64, y: i64, width: u32, height: u32, frame_w: u32, frame_h: u32) -> Option<OverlayRect> {
    if frame_w == 0 || frame_h == 0 || width == 0 || height == 0 {
        return None;
    }

    let width = width.min(frame_w);
    let height = height.min(frame_h);
    let x = x.clamp(0, (frame_w - width) as i64) as u32;
    let y = y.clamp(0, (frame_h - height) as i64) as u32;

    Some(OverlayRect { x, y, width, height })
}

/// Renders translated text and the frame label onto frames
pub struct Compositor {
    style: OverlayStyle,
    font: FontArc,
    label_prefix: String,
    label_anchor: LabelAnchor,
    label_offset: (u32, u32),
}

impl Compositor {
    /// Create a compositor with an explicit style and font
    pub fn new(style: OverlayStyle, font: FontArc) -> Self {
        let defaults = OverlaySettings::default();
        Self {
            style,
            font,
            label_prefix: defaults.label_prefix,
            label_anchor: defaults.label_anchor,
            label_offset: defaults.label_offset,
        }
    }

    /// Create a compositor from user settings, loading the font once
    pub fn from_settings(settings: &OverlaySettings) -> Result<Self> {
        let font = load_font(settings.font_path.as_deref(), settings.font_family.as_deref())?;
        Ok(Self::new(OverlayStyle::from_settings(settings), font).with_label(
            settings.label_prefix.clone(),
            settings.label_anchor,
            settings.label_offset,
        ))
    }

    /// Configure the frame label
    pub fn with_label(mut self, prefix: String, anchor: LabelAnchor, offset: (u32, u32)) -> Self {
        self.label_prefix = prefix;
        self.label_anchor = anchor;
        self.label_offset = offset;
        self
    }

    /// Measure text as (width, height) in pixels, stroke included
    ///
    /// Stroke overdraw only shifts glyphs sideways, so it widens the text
    /// without making it taller.
    pub fn measure(&self, text: &str) -> (u32, u32) {
        let scale = PxScale::from(self.style.font_px());
        let stroke = self.style.thickness.saturating_sub(1);
        let (w, h) = imageproc::drawing::text_size(scale, &self.font, text);

        (w + stroke, h)
    }

    /// Size of the padded background for `text`
    fn background_size(&self, text: &str) -> (u32, u32) {
        let (w, h) = self.measure(text);
        let pad = self.style.padding * 2;
        (w + pad, h + pad)
    }

    /// Compute where the overlay for one text region goes
    pub fn layout(&self, frame_size: (u32, u32), polygon: &[(f32, f32)], text: &str, language: &str) -> OverlaySpec {
        let anchor = polygon_anchor(polygon);
        let (bg_w, bg_h) = self.background_size(text);

        // Directly above the source text
        let background = clamp_rect(
            anchor.0 as i64,
            anchor.1 as i64 - bg_h as i64,
            bg_w,
            bg_h,
            frame_size.0,
            frame_size.1,
        );

        OverlaySpec {
            anchor,
            text: text.to_string(),
            language_label: language.to_uppercase(),
            background,
        }
    }

    /// Draw one overlay onto the frame
    pub fn render(&self, frame: &mut CapturedFrame, spec: &OverlaySpec) -> Result<(), RenderError> {
        let rect = spec.background.ok_or(RenderError::OutOfFrame {
            width: frame.width(),
            height: frame.height(),
        })?;

        self.draw_box(frame, rect, &spec.text);
        debug!("Rendered overlay {:?} at {:?}", spec.text, rect);
        Ok(())
    }

    /// Draw the frame-level language label in its reserved corner
    ///
    /// Returns the upper-cased code that was drawn.
    pub fn draw_label(&self, frame: &mut CapturedFrame, language: &str) -> Result<String, RenderError> {
        let code = language.to_uppercase();
        let text = format!("{}{}", self.label_prefix, code);
        let (bg_w, bg_h) = self.background_size(&text);
        let (frame_w, frame_h) = frame.dimensions();
        let (ox, oy) = (self.label_offset.0 as i64, self.label_offset.1 as i64);

        let x = match self.label_anchor {
            LabelAnchor::TopLeft | LabelAnchor::BottomLeft => ox,
            LabelAnchor::TopRight | LabelAnchor::BottomRight => frame_w as i64 - bg_w as i64 - ox,
        };
        let y = match self.label_anchor {
            LabelAnchor::TopLeft | LabelAnchor::TopRight => oy,
            LabelAnchor::BottomLeft | LabelAnchor::BottomRight => frame_h as i64 - bg_h as i64 - oy,
        };

        let rect = clamp_rect(x, y, bg_w, bg_h, frame_w, frame_h).ok_or(RenderError::OutOfFrame {
            width: frame_w,
            height: frame_h,
        })?;

        self.draw_box(frame, rect, &text);
        Ok(code)
    }

    fn draw_box(&self, frame: &mut CapturedFrame, rect: OverlayRect, text: &str) {
        blend_rect(frame, rect, self.style.background_rgba8());

        if text.is_empty() {
            return;
        }

        let scale = PxScale::from(self.style.font_px());
        let color = Rgba(self.style.text_rgba8());
        let x = (rect.x + self.style.padding) as i32;
        let y = (rect.y + self.style.padding) as i32;

        // Thickness by overdraw, one pixel apart
        for dx in 0..self.style.thickness as i32 {
            imageproc::drawing::draw_text_mut(&mut frame.image, color, x + dx, y, scale, &self.font, text);
        }
    }
}

/// Alpha-blend a solid color over a rectangle of the frame
fn blend_rect(frame: &mut CapturedFrame, rect: OverlayRect, color: [u8; 4]) {
    let alpha = color[3] as u16;
    let keep = 255 - alpha;

    for y in rect.y..rect.bottom().min(frame.height()) {
        for x in rect.x..rect.right().min(frame.width()) {
            let pixel = frame.image.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended = (pixel.0[c] as u16 * keep + color[c] as u16 * alpha + 127) / 255;
                pixel.0[c] = blended as u8;
            }
        }
    }
}

/// Number of pixels inside `rect` painted exactly in `color`
#[cfg(test)]
pub(crate) fn count_color(frame: &CapturedFrame, rect: OverlayRect, color: [u8; 4]) -> usize {
    (rect.y..rect.bottom())
        .flat_map(|y| (rect.x..rect.right()).map(move |x| (x, y)))
        .filter(|&(x, y)| frame.image.get_pixel(x, y).0 == color)
        .count()
}
