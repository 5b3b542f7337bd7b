//! Runtime counters and the cooperative stop signal

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runtime state that is not persisted
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    /// Whether a capture session is currently active
    pub is_capturing: bool,
    /// Current capture source description
    pub current_source: Option<String>,
    /// Frames processed in the current or last session
    pub frames_processed: u64,
    /// Text regions found in the current or last session
    pub detections: usize,
    /// Translations that fell back to the source text
    pub failed_translations: usize,
    /// Measured processing rate
    pub capture_fps: f32,
    /// Last error message (if any)
    pub last_error: Option<String>,
}

impl RuntimeState {
    /// Reset counters at the start of a session
    pub fn begin_session(&mut self, source: String) {
        *self = Self {
            is_capturing: true,
            current_source: Some(source),
            ..Self::default()
        };
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}

/// Runtime state handle shared between the loop and observers
pub type SharedRuntime = Arc<RwLock<RuntimeState>>;

/// Cooperative stop request, checked by the streaming loop between frames
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop after the frame in flight
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
