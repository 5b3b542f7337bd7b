//! Frame Translation Pipeline
//!
//! `FrameProcessor` runs detection, language identification, translation and
//! compositing for one frame. `StreamLoop` (in `stream`) feeds it frames from
//! a capture source and hands the annotated frames to a sink.
//!
//! Per-detection failures never fail the frame: an unidentified language falls
//! back to the configured code, a failed translation keeps the source text, and
//! a failed render leaves that region unannotated.

pub mod sink;
pub mod stream;

use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::capture::frame::CapturedFrame;
use crate::overlay::{Compositor, OverlaySpec};
use crate::translate::{same_language, normalize_language, LanguageIdentifier, Translator, UNKNOWN_LANGUAGE};
use crate::vision::{Detection, TextDetector};

pub use sink::{OutputSink, PngSink};
pub use stream::{SessionSummary, StopReason, StreamError, StreamLoop};

/// The external capabilities a frame processor needs
///
/// Built once at startup and lent to every processor, so tests can swap in
/// their own implementations.
pub struct PipelineContext {
    pub detector: Box<dyn TextDetector>,
    pub identifier: Box<dyn LanguageIdentifier>,
    pub translator: Box<dyn Translator>,
}

impl PipelineContext {
    pub fn new(
        detector: Box<dyn TextDetector>,
        identifier: Box<dyn LanguageIdentifier>,
        translator: Box<dyn Translator>,
    ) -> Self {
        Self {
            detector,
            identifier,
            translator,
        }
    }
}

/// How the text of one detection was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// Already in the target language; no translation requested
    SameLanguage,
    /// Translated by the service
    Translated,
    /// The service failed; the source text is kept
    Failed,
}

/// Translation of one detection
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationResult {
    pub source_text: String,
    pub detected_language: String,
    pub target_language: String,
    pub translated_text: String,
    pub outcome: TranslationOutcome,
}

impl TranslationResult {
    /// Language the translated text is actually written in
    pub fn display_language(&self) -> &str {
        match self.outcome {
            TranslationOutcome::Failed => &self.detected_language,
            TranslationOutcome::SameLanguage | TranslationOutcome::Translated => &self.target_language,
        }
    }
}

/// What happened to one frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    /// One entry per detection, in detection order
    pub results: Vec<TranslationResult>,
    /// One entry per detection, in detection order
    pub overlays: Vec<OverlaySpec>,
    /// Language code drawn in the frame label, if the label was drawn
    pub label: Option<String>,
    /// Overlays that could not be drawn
    pub render_failures: usize,
    pub elapsed: Duration,
}

impl FrameReport {
    /// Number of detections whose translation failed
    pub fn failed_translations(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == TranslationOutcome::Failed)
            .count()
    }
}

/// Translates the text of one frame in place
pub struct FrameProcessor<'a> {
    context: &'a PipelineContext,
    compositor: Compositor,
    fallback_language: String,
}

impl<'a> FrameProcessor<'a> {
    pub fn new(context: &'a PipelineContext, compositor: Compositor, fallback_language: &str) -> Self {
        let fallback = normalize_language(fallback_language);
        Self {
            context,
            compositor,
            fallback_language: if fallback.is_empty() {
                UNKNOWN_LANGUAGE.to_string()
            } else {
                fallback
            },
        }
    }

    /// Detect, translate and draw every text region of `frame`
    ///
    /// A frame without text is left untouched.
    pub fn process(&self, frame: &mut CapturedFrame, target_language: &str) -> FrameReport {
        let start = Instant::now();
        let target = normalize_language(target_language);

        let detections = match self.context.detector.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Text detection failed on frame {}: {:#}", frame.index, e);
                Vec::new()
            }
        };

        let results: Vec<TranslationResult> = detections
            .iter()
            .map(|detection| self.resolve(detection, &target))
            .collect();

        let mut overlays = Vec::with_capacity(detections.len());
        let mut render_failures = 0;
        for (detection, result) in detections.iter().zip(&results) {
            let spec = self.compositor.layout(
                frame.dimensions(),
                &detection.polygon,
                &result.translated_text,
                result.display_language(),
            );
            if let Err(e) = self.compositor.render(frame, &spec) {
                warn!("Skipping overlay for {:?}: {}", result.translated_text, e);
                render_failures += 1;
            }
            overlays.push(spec);
        }

        let label = if detections.is_empty() {
            None
        } else {
            match self.compositor.draw_label(frame, &target) {
                Ok(code) => Some(code),
                Err(e) => {
                    warn!("Skipping language label: {}", e);
                    None
                }
            }
        };

        let report = FrameReport {
            frame_index: frame.index,
            results,
            overlays,
            label,
            render_failures,
            elapsed: start.elapsed(),
        };

        debug!(
            "Frame {} processed in {:?}: {} detections, {} failed translations",
            report.frame_index,
            report.elapsed,
            report.results.len(),
            report.failed_translations()
        );

        report
    }

    /// Identify and translate the text of one detection
    fn resolve(&self, detection: &Detection, target: &str) -> TranslationResult {
        let detected = self.identify(&detection.text);

        let (translated_text, outcome) = if same_language(&detected, target) {
            (detection.text.clone(), TranslationOutcome::SameLanguage)
        } else {
            match self.context.translator.translate(&detection.text, target) {
                Ok(text) => (text, TranslationOutcome::Translated),
                Err(e) => {
                    warn!("Translation of {:?} failed, keeping source text: {}", detection.text, e);
                    (detection.text.clone(), TranslationOutcome::Failed)
                }
            }
        };

        TranslationResult {
            source_text: detection.text.clone(),
            detected_language: detected,
            target_language: target.to_string(),
            translated_text,
            outcome,
        }
    }

    fn identify(&self, text: &str) -> String {
        match self.context.identifier.identify(text) {
            Ok(code) => normalize_language(&code),
            Err(e) => {
                debug!("Language of {:?} unidentified ({}), assuming {}", text, e, self.fallback_language);
                self.fallback_language.clone()
            }
        }
    }
}
