//! Streaming loop
//!
//! Idle -> Capturing -> (read, process, emit)* -> Stopped. One frame is fully
//! processed and emitted before the next read. The stop signal is checked once
//! per iteration after the emit, so a stop request never aborts a frame midway.

use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::sink::OutputSink;
use super::FrameProcessor;
use crate::capture::{CaptureError, CaptureSession, VideoSource};
use crate::shared::{SharedRuntime, StopSignal};

/// Streaming loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Capturing,
    Stopped,
}

/// Why a session ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop signal was raised
    Cancelled,
    /// The source ran out of frames
    EndOfStream,
    /// The configured frame limit was reached
    FrameLimit,
}

/// Session-ending failures
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("capture failed after {frames} frames: {source}")]
    Capture {
        frames: u64,
        #[source]
        source: CaptureError,
    },
}

/// Totals for one finished session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub frames: u64,
    pub detections: usize,
    pub failed_translations: usize,
    pub reason: StopReason,
    pub elapsed: Duration,
}

/// Pulls frames from a source, translates them and emits them to a sink
pub struct StreamLoop<'a, K: OutputSink> {
    processor: FrameProcessor<'a>,
    sink: K,
    target_language: String,
    stop: StopSignal,
    max_fps: u32,
    max_frames: Option<u64>,
    runtime: Option<SharedRuntime>,
    state: StreamState,
}

impl<'a, K: OutputSink> StreamLoop<'a, K> {
    pub fn new(processor: FrameProcessor<'a>, sink: K, target_language: &str, stop: StopSignal) -> Self {
        Self {
            processor,
            sink,
            target_language: target_language.to_string(),
            stop,
            max_fps: 0,
            max_frames: None,
            runtime: None,
            state: StreamState::Idle,
        }
    }

    /// Limit the processing rate (0 = unthrottled)
    pub fn with_max_fps(mut self, max_fps: u32) -> Self {
        self.max_fps = max_fps;
        self
    }

    /// Stop after `max_frames` frames
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Publish progress to a shared runtime state
    pub fn with_runtime(mut self, runtime: SharedRuntime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Run one capture session to completion
    ///
    /// The source is released exactly once, whichever way the session ends.
    pub fn run<S: VideoSource>(&mut self, source: S) -> Result<SessionSummary, StreamError> {
        let session_id = Uuid::new_v4();
        let span = info_span!("session", id = %session_id);
        let _enter = span.enter();

        if let Some(runtime) = &self.runtime {
            runtime.write().begin_session(source.describe());
        }

        let started = Instant::now();
        let frame_interval = (self.max_fps > 0).then(|| Duration::from_secs_f64(1.0 / self.max_fps as f64));
        let mut session = CaptureSession::acquire(source);
        self.state = StreamState::Capturing;
        info!("Streaming started, translating to {}", self.target_language);

        let mut frames = 0u64;
        let mut detections = 0usize;
        let mut failed_translations = 0usize;

        let reason = loop {
            let tick = Instant::now();

            let mut frame = match session.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::EndOfStream,
                Err(e) => {
                    error!("Capture failed after {} frames: {}", frames, e);
                    session.close();
                    self.state = StreamState::Stopped;
                    if let Some(runtime) = &self.runtime {
                        let mut rt = runtime.write();
                        rt.is_capturing = false;
                        rt.set_error(e.to_string());
                    }
                    return Err(StreamError::Capture { frames, source: e });
                }
            };

            let report = self.processor.process(&mut frame, &self.target_language);
            detections += report.results.len();
            failed_translations += report.failed_translations();

            if let Err(e) = self.sink.emit(&frame) {
                warn!("Failed to emit frame {}: {:#}", frame.index, e);
            }
            debug!("Frame {} done {:?} after capture", frame.index, frame.timestamp.elapsed());
            frames += 1;

            if let Some(runtime) = &self.runtime {
                let mut rt = runtime.write();
                rt.frames_processed = frames;
                rt.detections = detections;
                rt.failed_translations = failed_translations;
                let secs = started.elapsed().as_secs_f32();
                if secs > 0.0 {
                    rt.capture_fps = frames as f32 / secs;
                }
            }

            if self.stop.is_stopped() {
                break StopReason::Cancelled;
            }
            if self.max_frames.is_some_and(|max| frames >= max) {
                break StopReason::FrameLimit;
            }

            if let Some(interval) = frame_interval {
                let spent = tick.elapsed();
                if spent < interval {
                    std::thread::sleep(interval - spent);
                } else {
                    debug!("Frame {} took {:?}, over the {:?} budget", frame.index, spent, interval);
                }
            }
        };

        session.close();
        self.state = StreamState::Stopped;
        if let Some(runtime) = &self.runtime {
            runtime.write().is_capturing = false;
        }

        let summary = SessionSummary {
            session_id,
            frames,
            detections,
            failed_translations,
            reason,
            elapsed: started.elapsed(),
        };
        info!(
            "Streaming stopped ({:?}) after {} frames, {} detections, {} failed translations",
            summary.reason, summary.frames, summary.detections, summary.failed_translations
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::CapturedFrame;
    use crate::overlay::{test_font, Compositor, OverlayStyle};
    use crate::pipeline::testing::{quad, FixedDetector, ScriptedTranslator, TableIdentifier};
    use crate::pipeline::PipelineContext;
    use crate::shared::RuntimeState;
    use crate::vision::Detection;
    use image::{Rgba, RgbaImage};
    use parking_lot::{Mutex, RwLock};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Produces `total` frames (or forever), optionally failing at read `fail_at`
    struct MockSource {
        produced: u64,
        total: Option<u64>,
        fail_at: Option<u64>,
        releases: Arc<AtomicUsize>,
    }

    impl MockSource {
        fn new(total: Option<u64>, fail_at: Option<u64>) -> (Self, Arc<AtomicUsize>) {
            let releases = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    produced: 0,
                    total,
                    fail_at,
                    releases: releases.clone(),
                },
                releases,
            )
        }
    }

    impl VideoSource for MockSource {
        fn read(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
            if self.fail_at == Some(self.produced) {
                return Err(CaptureError::Device("camera unplugged".to_string()));
            }
            if self.total.is_some_and(|t| self.produced >= t) {
                return Ok(None);
            }
            let frame = CapturedFrame::new(RgbaImage::from_pixel(80, 60, Rgba([0, 0, 0, 255])), self.produced);
            self.produced += 1;
            Ok(Some(frame))
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn describe(&self) -> String {
            "mock".to_string()
        }
    }

    /// Records emitted frame indexes; raises the stop signal after `stop_after` emits
    struct RecordingSink {
        emitted: Arc<Mutex<Vec<u64>>>,
        stop_after: Option<(usize, StopSignal)>,
        fail: bool,
    }

    impl OutputSink for RecordingSink {
        fn emit(&mut self, frame: &CapturedFrame) -> anyhow::Result<()> {
            let mut emitted = self.emitted.lock();
            emitted.push(frame.index);
            if let Some((n, stop)) = &self.stop_after {
                if emitted.len() >= *n {
                    stop.stop();
                }
            }
            if self.fail {
                anyhow::bail!("display closed");
            }
            Ok(())
        }
    }

    fn context() -> PipelineContext {
        PipelineContext::new(
            Box::new(FixedDetector(vec![Detection::new(quad(5.0, 30.0, 30.0, 10.0), "Hola")])),
            Box::new(TableIdentifier::new(&[("Hola", "es")])),
            Box::new(ScriptedTranslator::new(&[("Hola", "en", "Hello")], &[])),
        )
    }

    fn sink(stop_after: Option<(usize, StopSignal)>, fail: bool) -> (RecordingSink, Arc<Mutex<Vec<u64>>>) {
        let emitted = Arc::new(Mutex::new(Vec::new()));
        (
            RecordingSink {
                emitted: emitted.clone(),
                stop_after,
                fail,
            },
            emitted,
        )
    }

    fn processor(ctx: &PipelineContext) -> FrameProcessor<'_> {
        FrameProcessor::new(ctx, Compositor::new(OverlayStyle::default(), test_font()), "en")
    }

    #[test]
    fn test_cancellation_finishes_current_frame_and_releases_once() {
        let ctx = context();
        let stop = StopSignal::new();
        let (sink, emitted) = sink(Some((2, stop.clone())), false);
        let (source, releases) = MockSource::new(None, None);

        let mut stream = StreamLoop::new(processor(&ctx), sink, "en", stop);
        assert_eq!(stream.state(), StreamState::Idle);
        let summary = stream.run(source).unwrap();

        assert_eq!(summary.reason, StopReason::Cancelled);
        assert_eq!(summary.frames, 2);
        assert_eq!(*emitted.lock(), vec![0, 1]);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(stream.state(), StreamState::Stopped);
    }

    #[test]
    fn test_read_failure_ends_session_and_releases_once() {
        let ctx = context();
        let (sink, emitted) = sink(None, false);
        let (source, releases) = MockSource::new(None, Some(3));
        let runtime = Arc::new(RwLock::new(RuntimeState::default()));

        let mut stream = StreamLoop::new(processor(&ctx), sink, "en", StopSignal::new()).with_runtime(runtime.clone());
        let result = stream.run(source);

        match result {
            Err(StreamError::Capture { frames, source }) => {
                assert_eq!(frames, 3);
                assert!(matches!(source, CaptureError::Device(_)));
            }
            other => panic!("expected capture failure, got {:?}", other),
        }
        assert_eq!(*emitted.lock(), vec![0, 1, 2]);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(stream.state(), StreamState::Stopped);

        let rt = runtime.read();
        assert!(!rt.is_capturing);
        assert_eq!(rt.frames_processed, 3);
        assert!(rt.last_error.as_deref().unwrap().contains("camera unplugged"));
    }

    #[test]
    fn test_end_of_stream_emits_in_capture_order() {
        let ctx = context();
        let (sink, emitted) = sink(None, false);
        let (source, releases) = MockSource::new(Some(4), None);
        let runtime = Arc::new(RwLock::new(RuntimeState::default()));

        let mut stream = StreamLoop::new(processor(&ctx), sink, "en", StopSignal::new()).with_runtime(runtime.clone());
        let summary = stream.run(source).unwrap();

        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.detections, 4);
        assert_eq!(summary.failed_translations, 0);
        assert_eq!(*emitted.lock(), vec![0, 1, 2, 3]);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.read().detections, 4);
    }

    #[test]
    fn test_frame_limit() {
        let ctx = context();
        let (sink, emitted) = sink(None, false);
        let (source, releases) = MockSource::new(None, None);

        let mut stream = StreamLoop::new(processor(&ctx), sink, "en", StopSignal::new()).with_max_frames(Some(5));
        let summary = stream.run(source).unwrap();

        assert_eq!(summary.reason, StopReason::FrameLimit);
        assert_eq!(emitted.lock().len(), 5);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sink_failure_does_not_stop_loop() {
        let ctx = context();
        let (sink, emitted) = sink(None, true);
        let (source, releases) = MockSource::new(Some(3), None);

        let mut stream = StreamLoop::new(processor(&ctx), sink, "en", StopSignal::new());
        let summary = stream.run(source).unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(emitted.lock().len(), 3);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_on_first_read() {
        let ctx = context();
        let (sink, emitted) = sink(None, false);
        let (source, releases) = MockSource::new(None, Some(0));

        let mut stream = StreamLoop::new(processor(&ctx), sink, "en", StopSignal::new());
        assert!(matches!(stream.run(source), Err(StreamError::Capture { frames: 0, .. })));
        assert!(emitted.lock().is_empty());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frames_are_annotated_before_emit() {
        struct Capture(Arc<Mutex<Option<CapturedFrame>>>);
        impl OutputSink for Capture {
            fn emit(&mut self, frame: &CapturedFrame) -> anyhow::Result<()> {
                *self.0.lock() = Some(frame.clone());
                Ok(())
            }
        }

        let ctx = context();
        let (source, _) = MockSource::new(Some(1), None);

        let captured = Arc::new(Mutex::new(None));
        let mut stream = StreamLoop::new(processor(&ctx), Capture(captured.clone()), "en", StopSignal::new());
        stream.run(source).unwrap();

        let frame = captured.lock().take().unwrap();
        assert!(frame.image.pixels().any(|p| p.0 != [0, 0, 0, 255]));
    }
}
