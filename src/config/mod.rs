//! Application Configuration
//!
//! User settings and preferences stored in TOML format. Every section has
//! defaults, so a config file only needs the keys it wants to change.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Language settings
    pub general: GeneralConfig,
    /// Capture settings
    pub capture: CaptureSettings,
    /// Overlay settings
    pub overlay: OverlaySettings,
    /// OCR settings
    pub vision: VisionSettings,
    /// Translation service settings
    pub translation: TranslationSettings,
    /// Where annotated frames go
    pub output: OutputSettings,
}

/// Language settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Language all overlay text is translated into
    pub target_language: String,
    /// Language assumed when identification fails
    pub fallback_language: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            target_language: "en".to_string(),
            fallback_language: "en".to_string(),
        }
    }
}

/// Which kind of video source to stream from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSourceKind {
    /// A directory of still frames played back in name order
    #[default]
    Frames,
    /// Live capture of a monitor
    Screen,
}

/// Capture-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Source kind
    pub source: CaptureSourceKind,
    /// Frame directory for the `frames` source
    pub frames_dir: Option<PathBuf>,
    /// Monitor index for the `screen` source (0 = first)
    pub monitor_index: usize,
    /// Maximum frames per second to process (0 = unthrottled)
    pub max_fps: u32,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            source: CaptureSourceKind::Frames,
            frames_dir: None,
            monitor_index: 0,
            max_fps: 30,
            max_frames: None,
        }
    }
}

/// Overlay-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// TrueType/OpenType font file; takes precedence over `font_family`
    pub font_path: Option<PathBuf>,
    /// System font family to look up when no file is given (sans-serif if unset)
    pub font_family: Option<String>,
    /// Font scale (1.0 = 30px glyphs)
    pub font_scale: f32,
    /// Stroke thickness in pixels
    pub thickness: u32,
    /// Background opacity (0.0 - 1.0)
    pub opacity: f32,
    /// Text drawn before the language code in the frame label
    pub label_prefix: String,
    /// Frame corner reserved for the label
    pub label_anchor: LabelAnchor,
    /// Label distance from its corner
    pub label_offset: (u32, u32),
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            font_path: None,
            font_family: None,
            font_scale: 0.8,
            thickness: 2,
            opacity: 0.6,
            label_prefix: "Translated Language: ".to_string(),
            label_anchor: LabelAnchor::TopLeft,
            label_offset: (10, 10),
        }
    }
}

/// Corner anchor for the frame label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelAnchor {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// OCR settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Directory holding the OCR models (defaults to the data directory)
    pub models_dir: Option<PathBuf>,
    /// Recognized lines shorter than this (after trimming) are dropped
    pub min_text_chars: usize,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            models_dir: None,
            min_text_chars: 1,
        }
    }
}

/// Translation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// Translation endpoint
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Texts shorter than this are not sent for language identification
    pub min_identify_chars: usize,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
            timeout_secs: 10,
            min_identify_chars: 3,
        }
    }
}

/// How annotated frames are written out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// One numbered PNG per frame
    #[default]
    Sequence,
    /// Overwrite `latest.png` with every frame (live preview)
    Latest,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Output directory
    pub dir: PathBuf,
    /// Output mode
    pub mode: OutputMode,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("lexi-output"),
            mode: OutputMode::Sequence,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file, creating its directory if needed
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write config file {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.general.target_language, "en");
        assert_eq!(config.general.fallback_language, "en");

        assert_eq!(config.capture.source, CaptureSourceKind::Frames);
        assert_eq!(config.capture.max_fps, 30);
        assert!(config.capture.max_frames.is_none());

        assert!((config.overlay.font_scale - 0.8).abs() < 0.01);
        assert_eq!(config.overlay.thickness, 2);
        assert_eq!(config.overlay.label_anchor, LabelAnchor::TopLeft);
        assert_eq!(config.overlay.label_offset, (10, 10));

        assert_eq!(config.translation.timeout_secs, 10);
        assert_eq!(config.output.mode, OutputMode::Sequence);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.general.target_language = "fr".to_string();
        config.capture.source = CaptureSourceKind::Screen;
        config.capture.max_frames = Some(120);
        config.output.mode = OutputMode::Latest;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.general.target_language, "fr");
        assert_eq!(parsed.capture.source, CaptureSourceKind::Screen);
        assert_eq!(parsed.capture.max_frames, Some(120));
        assert_eq!(parsed.output.mode, OutputMode::Latest);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [general]
            target_language = "de"

            [capture]
            source = "screen"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.general.target_language, "de");
        assert_eq!(parsed.general.fallback_language, "en");
        assert_eq!(parsed.capture.source, CaptureSourceKind::Screen);
        assert_eq!(parsed.capture.max_fps, 30);
        assert_eq!(parsed.overlay.thickness, 2);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.general.target_language, loaded.general.target_language);
        assert_eq!(config.capture.max_fps, loaded.capture.max_fps);
    }

    #[test]
    fn test_save_config_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexi").join("config.toml");
        let mut config = AppConfig::default();
        config.overlay.font_family = Some("Noto Sans".to_string());

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.overlay.font_family.as_deref(), Some("Noto Sans"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
