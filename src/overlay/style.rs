//! Overlay styling and font loading

use ab_glyph::{FontArc, FontVec};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};
use usvg::fontdb;

use crate::config::OverlaySettings;

/// Glyph height in pixels at font scale 1.0
pub const BASE_FONT_PX: f32 = 30.0;

/// Families tried, in order, when no sans-serif default is registered
const FALLBACK_FAMILIES: &[&str] = &["DejaVu Sans", "Noto Sans", "Liberation Sans", "Arial", "Helvetica"];

/// Style for overlay backgrounds and text
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    /// Background color (RGBA, alpha is the blend opacity)
    pub background: [f32; 4],
    /// Text color (RGBA)
    pub text_color: [f32; 4],
    /// Padding around text inside the background
    pub padding: u32,
    /// Font scale relative to `BASE_FONT_PX`
    pub font_scale: f32,
    /// Stroke thickness in pixels
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            background: [0.5, 0.5, 0.5, 0.6],
            text_color: [1.0, 1.0, 1.0, 1.0],
            padding: 4,
            font_scale: 0.8,
            thickness: 2,
        }
    }
}

impl OverlayStyle {
    /// Build the style from user settings
    pub fn from_settings(settings: &OverlaySettings) -> Self {
        let defaults = Self::default();
        Self {
            background: [
                defaults.background[0],
                defaults.background[1],
                defaults.background[2],
                settings.opacity.clamp(0.0, 1.0),
            ],
            font_scale: settings.font_scale.max(0.1),
            thickness: settings.thickness.max(1),
            ..defaults
        }
    }

    /// Glyph height in pixels
    pub fn font_px(&self) -> f32 {
        BASE_FONT_PX * self.font_scale
    }

    /// Background color as 8-bit RGB plus blend alpha
    pub fn background_rgba8(&self) -> [u8; 4] {
        to_rgba8(self.background)
    }

    /// Text color as 8-bit RGBA
    pub fn text_rgba8(&self) -> [u8; 4] {
        to_rgba8(self.text_color)
    }
}

fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Resolve the overlay font
///
/// A configured file wins; otherwise the system font database is queried for
/// the configured family, then sans-serif, then a list of common families, then
/// any installed face. Fails when nothing can be loaded.
pub fn load_font(font_path: Option<&Path>, font_family: Option<&str>) -> Result<FontArc> {
    if let Some(path) = font_path {
        let data = std::fs::read(path).with_context(|| format!("Failed to read font {:?}", path))?;
        let font = FontArc::try_from_vec(data).map_err(|e| anyhow!("Failed to parse font {:?}: {}", path, e))?;
        info!("Loaded overlay font {:?}", path);
        return Ok(font);
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    debug!("Font database holds {} faces", db.len());

    if let Some(family) = font_family {
        return query_family(&db, fontdb::Family::Name(family))
            .ok_or_else(|| anyhow!("Font family {:?} not found", family));
    }

    let font = query_family(&db, fontdb::Family::SansSerif)
        .or_else(|| {
            FALLBACK_FAMILIES
                .iter()
                .find_map(|name| query_family(&db, fontdb::Family::Name(name)))
        })
        .or_else(|| db.faces().find_map(|face| face_font(&db, face.id)))
        .ok_or_else(|| anyhow!("No usable system font found; set overlay.font_path"))?;

    Ok(font)
}

fn query_family(db: &fontdb::Database, family: fontdb::Family<'_>) -> Option<FontArc> {
    let families = [family];
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db.query(&query)?;
    let font = face_font(db, id)?;
    info!("Loaded overlay font {:?}", families[0]);
    Some(font)
}

fn face_font(db: &fontdb::Database, id: fontdb::ID) -> Option<FontArc> {
    let (data, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
    match FontVec::try_from_vec_and_index(data, index) {
        Ok(font) => Some(FontArc::new(font)),
        Err(e) => {
            warn!("Skipping unreadable font face: {}", e);
            None
        }
    }
}

/// System font shared by rendering tests
#[cfg(test)]
pub(crate) fn test_font() -> FontArc {
    static FONT: std::sync::OnceLock<FontArc> = std::sync::OnceLock::new();
    FONT.get_or_init(|| load_font(None, None).expect("rendering tests need an installed font"))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_from_settings() {
        let settings = OverlaySettings {
            opacity: 1.5,
            font_scale: 1.0,
            thickness: 0,
            ..Default::default()
        };
        let style = OverlayStyle::from_settings(&settings);

        assert_eq!(style.background_rgba8(), [128, 128, 128, 255]);
        assert_eq!(style.thickness, 1);
        assert!((style.font_px() - 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_colors() {
        let style = OverlayStyle::default();
        assert_eq!(style.text_rgba8(), [255, 255, 255, 255]);
        assert_eq!(style.background_rgba8(), [128, 128, 128, 153]);
    }

    #[test]
    fn test_missing_font_path() {
        assert!(load_font(Some(Path::new("/nonexistent/font.ttf")), None).is_err());
    }

    #[test]
    fn test_unknown_family_is_an_error() {
        assert!(load_font(None, Some("No Such Family 1234")).is_err());
    }

    #[test]
    fn test_system_sans_serif_has_latin_glyphs() {
        use ab_glyph::Font;

        let font = load_font(None, None).unwrap();
        assert_ne!(font.glyph_id('H').0, 0);
    }
}
