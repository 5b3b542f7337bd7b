//! Destinations for annotated frames

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::capture::frame::CapturedFrame;
use crate::config::{OutputMode, OutputSettings};

/// Receives annotated frames from the streaming loop
///
/// A failed emit is logged by the loop and does not stop it.
pub trait OutputSink {
    fn emit(&mut self, frame: &CapturedFrame) -> Result<()>;
}

impl<K: OutputSink + ?Sized> OutputSink for Box<K> {
    fn emit(&mut self, frame: &CapturedFrame) -> Result<()> {
        (**self).emit(frame)
    }
}

/// Writes frames as PNG files
pub struct PngSink {
    dir: PathBuf,
    mode: OutputMode,
}

impl PngSink {
    /// Create the sink, making the output directory if needed
    pub fn new(dir: &Path, mode: OutputMode) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory {:?}", dir))?;
        info!("Writing annotated frames to {:?} ({:?})", dir, mode);
        Ok(Self {
            dir: dir.to_path_buf(),
            mode,
        })
    }

    /// Create the sink from user settings
    pub fn from_settings(settings: &OutputSettings) -> Result<Self> {
        Self::new(&settings.dir, settings.mode)
    }

    /// Path the frame will be written to
    pub fn path_for(&self, frame: &CapturedFrame) -> PathBuf {
        match self.mode {
            OutputMode::Sequence => self.dir.join(format!("frame_{:06}.png", frame.index)),
            OutputMode::Latest => self.dir.join("latest.png"),
        }
    }
}

impl OutputSink for PngSink {
    fn emit(&mut self, frame: &CapturedFrame) -> Result<()> {
        let path = self.path_for(frame);

        // Write next to the target and rename, so viewers never see half a file
        let temp = path.with_extension("png.tmp");
        frame
            .image
            .save_with_format(&temp, image::ImageFormat::Png)
            .with_context(|| format!("Failed to write frame {:?}", temp))?;
        std::fs::rename(&temp, &path).with_context(|| format!("Failed to move frame to {:?}", path))?;
        Ok(())
    }
}
