//! Application Coordinator
//!
//! Builds the long-lived pieces (pipeline context, compositor, sinks) from the
//! configuration and runs the user-facing commands on top of them.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::capture::frame::CapturedFrame;
use crate::capture::open_source;
use crate::config::AppConfig;
use crate::overlay::Compositor;
use crate::pipeline::{FrameProcessor, FrameReport, PipelineContext, PngSink, SessionSummary, StreamLoop};
use crate::shared::{RuntimeState, SharedRuntime, StopSignal};
use crate::translate::{GoogleTranslate, Translator};
use crate::vision::{ModelManager, OcrsDetector};

/// Main application coordinator
pub struct LexiApp {
    config: AppConfig,
    runtime: SharedRuntime,
}

impl LexiApp {
    /// Create a new application coordinator
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            runtime: Arc::new(RwLock::new(RuntimeState::default())),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle on the counters published by the streaming loop
    pub fn runtime(&self) -> SharedRuntime {
        self.runtime.clone()
    }

    /// Model manager for the configured models directory
    pub fn model_manager(&self) -> Result<ModelManager> {
        match &self.config.vision.models_dir {
            Some(dir) => ModelManager::with_dir(dir.clone()),
            None => ModelManager::new(),
        }
    }

    /// Translation client for the configured endpoint
    pub fn translator(&self) -> Result<GoogleTranslate> {
        GoogleTranslate::new(&self.config.translation, &self.config.general.target_language).context("Failed to create translation client")
    }

    /// Build the OCR engine and translation client
    ///
    /// One client serves as both identifier and translator.
    pub fn build_context(&self) -> Result<PipelineContext> {
        let models = self.model_manager()?;
        let detector = OcrsDetector::new(&models, self.config.vision.min_text_chars)?;
        let google = Arc::new(self.translator()?);

        Ok(PipelineContext::new(
            Box::new(detector),
            Box::new(google.clone()),
            Box::new(google),
        ))
    }

    fn frame_processor<'a>(&self, context: &'a PipelineContext) -> Result<FrameProcessor<'a>> {
        let compositor = Compositor::from_settings(&self.config.overlay).context("Failed to load overlay font")?;
        Ok(FrameProcessor::new(
            context,
            compositor,
            &self.config.general.fallback_language,
        ))
    }

    /// Run the live loop until the source ends, the frame limit is hit, or `stop` is raised
    pub fn run_stream(&self, context: &PipelineContext, stop: StopSignal) -> Result<SessionSummary> {
        let processor = self.frame_processor(context)?;
        let sink = PngSink::from_settings(&self.config.output)?;
        let source = open_source(&self.config.capture)?;

        let mut stream = StreamLoop::new(
            processor,
            sink,
            &self.config.general.target_language,
            stop,
        )
        .with_max_fps(self.config.capture.max_fps)
        .with_max_frames(self.config.capture.max_frames)
        .with_runtime(self.runtime.clone());

        let summary = stream.run(source)?;
        Ok(summary)
    }

    /// Translate the text of one image, optionally saving the annotated result
    pub fn translate_image(&self, context: &PipelineContext, path: &Path, output: Option<&Path>) -> Result<FrameReport> {
        let image = image::open(path)
            .with_context(|| format!("Failed to open image {:?}", path))?
            .to_rgba8();
        let mut frame = CapturedFrame::new(image, 0);

        let report = self
            .frame_processor(context)?
            .process(&mut frame, &self.config.general.target_language);
        info!(
            "Found {} text regions in {:?} in {:?}",
            report.results.len(),
            path,
            report.elapsed
        );

        if let Some(output) = output {
            frame
                .image
                .save(output)
                .with_context(|| format!("Failed to write annotated image {:?}", output))?;
            info!("Annotated image written to {:?}", output);
        }

        Ok(report)
    }

    /// Translate free text into the target language
    pub fn translate_texts(&self, translator: &dyn Translator, texts: &[String]) -> Result<Vec<String>> {
        let target = &self.config.general.target_language;
        let translated = match texts {
            [single] => vec![translator.translate(single, target)?],
            _ => translator.translate_batch(texts, target)?,
        };
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaptureSourceKind, OutputMode};
    use crate::pipeline::testing::{quad, FixedDetector, ScriptedTranslator, TableIdentifier};
    use crate::pipeline::{StopReason, TranslationOutcome};
    use crate::vision::Detection;
    use image::{Rgba, RgbaImage};

    fn hola_context() -> PipelineContext {
        PipelineContext::new(
            Box::new(FixedDetector(vec![Detection::new(quad(10.0, 40.0, 50.0, 20.0), "Hola")])),
            Box::new(TableIdentifier::new(&[("Hola", "es")])),
            Box::new(ScriptedTranslator::new(&[("Hola", "en", "Hello")], &[])),
        )
    }

    fn write_frame(path: &Path) {
        RgbaImage::from_pixel(120, 80, Rgba([0, 0, 0, 255])).save(path).unwrap();
    }

    #[test]
    fn test_translate_image_writes_annotated_copy() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sign.png");
        let output = dir.path().join("sign_en.png");
        write_frame(&input);

        let app = LexiApp::new(AppConfig::default());
        let report = app.translate_image(&hola_context(), &input, Some(&output)).unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].translated_text, "Hello");
        assert_eq!(report.results[0].outcome, TranslationOutcome::Translated);

        let annotated = image::open(&output).unwrap().to_rgba8();
        assert_ne!(annotated, image::open(&input).unwrap().to_rgba8());
    }

    #[test]
    fn test_translate_image_missing_file() {
        let app = LexiApp::new(AppConfig::default());
        assert!(app
            .translate_image(&hola_context(), Path::new("/nonexistent/sign.png"), None)
            .is_err());
    }

    #[test]
    fn test_run_stream_over_frame_directory() {
        let frames = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_frame(&frames.path().join(name));
        }

        let mut config = AppConfig::default();
        config.capture.source = CaptureSourceKind::Frames;
        config.capture.frames_dir = Some(frames.path().to_path_buf());
        config.capture.max_fps = 0;
        config.output.dir = out.path().to_path_buf();
        config.output.mode = OutputMode::Sequence;

        let app = LexiApp::new(config);
        let summary = app.run_stream(&hola_context(), StopSignal::new()).unwrap();

        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.detections, 3);
        for index in 0..3 {
            assert!(out.path().join(format!("frame_{:06}.png", index)).exists());
        }

        let runtime = app.runtime();
        let state = runtime.read();
        assert!(!state.is_capturing);
        assert_eq!(state.frames_processed, 3);
    }

    #[test]
    fn test_unloadable_font_fails_instead_of_drawing_blank_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sign.png");
        write_frame(&input);

        let mut config = AppConfig::default();
        config.overlay.font_path = Some(dir.path().join("missing.ttf"));
        let app = LexiApp::new(config);

        assert!(app.translate_image(&hola_context(), &input, None).is_err());
    }

    #[test]
    fn test_run_stream_requires_frames_dir() {
        let out = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.output.dir = out.path().to_path_buf();

        let app = LexiApp::new(config);
        assert!(app.run_stream(&hola_context(), StopSignal::new()).is_err());
    }

    #[test]
    fn test_translate_texts_single_and_batch() {
        let mut config = AppConfig::default();
        config.general.target_language = "fr".to_string();
        let app = LexiApp::new(config);
        let translator = ScriptedTranslator::new(&[("cat", "fr", "chat")], &[]);

        let single = app.translate_texts(&translator, &["cat".to_string()]).unwrap();
        assert_eq!(single, vec!["chat"]);

        let batch = app
            .translate_texts(&translator, &["cat".to_string(), "dog".to_string()])
            .unwrap();
        assert_eq!(batch, vec!["chat", "[fr] dog"]);
        assert_eq!(translator.call_count(), 3);
    }

    #[test]
    fn test_translate_texts_failure() {
        let app = LexiApp::new(AppConfig::default());
        let translator = ScriptedTranslator::new(&[], &["boom"]);

        assert!(app.translate_texts(&translator, &["boom".to_string()]).is_err());
    }
}
