//! Monitor capture through xcap
//!
//! Each `read` grabs a fresh screenshot of the selected monitor. A failed grab
//! is reported as a device failure, which ends the streaming session.

use tracing::info;
use xcap::Monitor;

use super::{CaptureError, VideoSource};
use crate::capture::frame::CapturedFrame;

/// Screen capture of one monitor
pub struct ScreenSource {
    monitor: Option<Monitor>,
    monitor_index: usize,
    frames: u64,
}

impl ScreenSource {
    /// Open the monitor at `monitor_index` (0 = first reported monitor)
    pub fn open(monitor_index: usize) -> Result<Self, CaptureError> {
        let monitors = Monitor::all()
            .map_err(|e| CaptureError::Open(format!("failed to enumerate monitors: {}", e)))?;

        let count = monitors.len();
        let monitor = monitors
            .into_iter()
            .nth(monitor_index)
            .ok_or_else(|| CaptureError::Open(format!("monitor {} not found ({} available)", monitor_index, count)))?;

        info!("Screen capture opened on monitor {}", monitor_index);

        Ok(Self {
            monitor: Some(monitor),
            monitor_index,
            frames: 0,
        })
    }
}

impl VideoSource for ScreenSource {
    fn read(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        let monitor = self.monitor.as_ref().ok_or(CaptureError::Released)?;

        let image = monitor
            .capture_image()
            .map_err(|e| CaptureError::Device(format!("failed to capture screen: {}", e)))?;

        let frame = CapturedFrame::new(image, self.frames);
        self.frames += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.monitor = None;
    }

    fn describe(&self) -> String {
        format!("monitor {}", self.monitor_index)
    }
}
