//! OCR (Optical Character Recognition) module
//!
//! Uses the ocrs engine (rten models) for text detection and recognition.

use anyhow::{Context, Result};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::time::Instant;
use tracing::{debug, info};

use super::{rotate_to_top_left, Detection, ModelManager, ModelType, TextDetector};
use crate::capture::frame::CapturedFrame;

/// Line-level text detector backed by ocrs
pub struct OcrsDetector {
    engine: OcrEngine,
    min_text_chars: usize,
}

impl OcrsDetector {
    /// Load the engine from the models held by `models`, downloading them if needed
    pub fn new(models: &ModelManager, min_text_chars: usize) -> Result<Self> {
        let det_path = models.ensure_model(ModelType::Detection)?;
        let rec_path = models.ensure_model(ModelType::Recognition)?;

        info!("Loading OCR models from {:?}", models.models_dir());
        let detection_model = Model::load_file(&det_path)
            .with_context(|| format!("Failed to load detection model {:?}", det_path))?;
        let recognition_model = Model::load_file(&rec_path)
            .with_context(|| format!("Failed to load recognition model {:?}", rec_path))?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .context("Failed to create OCR engine")?;

        info!("OCR engine initialized");
        Ok(Self {
            engine,
            min_text_chars,
        })
    }
}

impl TextDetector for OcrsDetector {
    fn detect(&self, frame: &CapturedFrame) -> Result<Vec<Detection>> {
        let start = Instant::now();

        let rgb = frame.to_rgb();
        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
            .context("Frame buffer does not match its dimensions")?;
        let input = self.engine.prepare_input(source)?;

        let words = self.engine.detect_words(&input)?;
        let line_groups = self.engine.find_text_lines(&input, &words);
        let lines = self.engine.recognize_text(&input, &line_groups)?;

        let detections: Vec<Detection> = lines
            .into_iter()
            .flatten()
            .filter_map(|line| {
                let text = line.to_string().trim().to_string();
                if text.chars().count() < self.min_text_chars.max(1) {
                    return None;
                }
                let corners = line
                    .rotated_rect()
                    .corners()
                    .iter()
                    .map(|p| (p.x, p.y))
                    .collect();
                Some(Detection::new(rotate_to_top_left(corners), text))
            })
            .collect();

        debug!(
            "OCR on frame {} complete in {:?}: {} text lines",
            frame.index,
            start.elapsed(),
            detections.len()
        );

        Ok(detections)
    }
}
