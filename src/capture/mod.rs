//! Video Capture Layer
//!
//! Frame sources for the streaming loop. A source hands out one frame per
//! `read` call and owns whatever device handle backs it; `CaptureSession`
//! wraps a source so the handle is released exactly once, whichever way the
//! session ends.

pub mod frame;
#[cfg(feature = "screen")]
pub mod screen;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capture::frame::CapturedFrame;
use crate::config::{CaptureSettings, CaptureSourceKind};

/// Errors raised by a video source
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device stopped delivering frames (disconnected, permission revoked, ...)
    #[error("capture device failure: {0}")]
    Device(String),
    /// The source could not be opened at all
    #[error("failed to open capture source: {0}")]
    Open(String),
    /// The source was already released
    #[error("capture source already released")]
    Released,
}

/// A source of video frames
pub trait VideoSource {
    /// Blocking read of the next frame
    ///
    /// `Ok(None)` means the stream ended normally; `Err` means the device failed.
    fn read(&mut self) -> Result<Option<CapturedFrame>, CaptureError>;

    /// Release the underlying device. Calling this more than once is a no-op.
    fn release(&mut self);

    /// Human-readable description used in logs
    fn describe(&self) -> String;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn read(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        (**self).read()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Scoped ownership of a video source
///
/// The source is released when the session is closed or dropped, never twice.
pub struct CaptureSession<S: VideoSource> {
    source: S,
    released: bool,
}

impl<S: VideoSource> CaptureSession<S> {
    /// Acquire a source for the lifetime of this session
    pub fn acquire(source: S) -> Self {
        info!("Capture session acquired: {}", source.describe());
        Self {
            source,
            released: false,
        }
    }

    /// Read the next frame from the owned source
    pub fn read(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        if self.released {
            return Err(CaptureError::Released);
        }
        self.source.read()
    }

    /// Release the source now instead of at drop time
    pub fn close(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.source.release();
            info!("Capture session released: {}", self.source.describe());
        }
    }
}

impl<S: VideoSource> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.release_once();
    }
}

/// Plays back a directory of still images as a video stream
///
/// Files are read in lexical order, so `frame_0001.png` style names replay in
/// capture order. The stream ends after the last file.
pub struct FrameDirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    released: bool,
}

impl FrameDirectorySource {
    /// Open a directory of frames
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CaptureError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_supported_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            warn!("No image frames found in {:?}", dir);
        } else {
            info!("Found {} frames in {:?}", files.len(), dir);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
            released: false,
        })
    }

    /// Number of frames left to play back
    pub fn remaining(&self) -> usize {
        self.files.len().saturating_sub(self.cursor)
    }
}

impl VideoSource for FrameDirectorySource {
    fn read(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        if self.released {
            return Err(CaptureError::Released);
        }

        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };

        let image = image::open(path)
            .map_err(|e| CaptureError::Device(format!("{}: {}", path.display(), e)))?
            .to_rgba8();

        let index = self.cursor as u64;
        self.cursor += 1;
        debug!("Read frame {} from {:?}", index, path);

        Ok(Some(CapturedFrame::new(image, index)))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.files.clear();
        }
    }

    fn describe(&self) -> String {
        format!("frames from {} ({} left)", self.dir.display(), self.remaining())
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp"))
            .unwrap_or(false)
}

/// Open the source selected in the capture settings
pub fn open_source(settings: &CaptureSettings) -> anyhow::Result<Box<dyn VideoSource>> {
    match settings.source {
        CaptureSourceKind::Frames => {
            let dir = settings
                .frames_dir
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("capture.frames_dir must be set for the frames source"))?;
            Ok(Box::new(FrameDirectorySource::open(dir)?))
        }
        #[cfg(feature = "screen")]
        CaptureSourceKind::Screen => Ok(Box::new(screen::ScreenSource::open(settings.monitor_index)?)),
        #[cfg(not(feature = "screen"))]
        CaptureSourceKind::Screen => {
            anyhow::bail!("screen capture support was not compiled in (enable the `screen` feature)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        releases: Arc<AtomicUsize>,
    }

    impl VideoSource for CountingSource {
        fn read(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
            Ok(None)
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_session_releases_once_on_close() {
        let releases = Arc::new(AtomicUsize::new(0));
        let session = CaptureSession::acquire(CountingSource {
            releases: releases.clone(),
        });

        session.close();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_releases_on_drop() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let _session = CaptureSession::acquire(CountingSource {
                releases: releases.clone(),
            });
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frame_directory_plays_in_order_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        for (name, shade) in [("frame_002.png", 200u8), ("frame_001.png", 100u8)] {
            RgbaImage::from_pixel(4, 3, Rgba([shade, shade, shade, 255]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = FrameDirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 2);

        let first = source.read().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.image.get_pixel(0, 0).0[0], 100);

        let second = source.read().unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.image.get_pixel(0, 0).0[0], 200);

        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_frame_directory_read_after_release_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FrameDirectorySource::open(dir.path()).unwrap();

        source.release();
        source.release();
        assert!(matches!(source.read(), Err(CaptureError::Released)));
    }

    #[test]
    fn test_frame_directory_missing_dir() {
        let result = FrameDirectorySource::open(Path::new("/nonexistent/frames"));
        assert!(matches!(result, Err(CaptureError::Open(_))));
    }
}
