//! Google Translate web endpoint client
//!
//! Talks to the public `translate_a/single` endpoint used by browser
//! extensions. The same response carries the translated sentences and the
//! detected source language, so one client serves as both the `Translator`
//! and the `LanguageIdentifier`. Identification asks for the usual target
//! language and the last reply is kept, so the translate call that follows
//! for the same text does not hit the network again.

use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use super::{normalize_language, IdentifyError, LanguageIdentifier, TranslationError, Translator};
use crate::config::TranslationSettings;

/// Parsed response of one request
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleResponse {
    /// Concatenated translated sentences
    pub translated: String,
    /// Source language the service detected, if any
    pub detected_language: Option<String>,
}

/// Blocking client for the Google Translate web endpoint
pub struct GoogleTranslate {
    client: reqwest::Client,
    runtime: Runtime,
    endpoint: String,
    min_identify_chars: usize,
    /// Target language requested by `identify`
    identify_target: String,
    /// Last reply, keyed by (text, target)
    last: Mutex<Option<(String, String, GoogleResponse)>>,
}

impl GoogleTranslate {
    /// Create a client from the translation settings
    ///
    /// `identify_target` should be the language frames are usually translated
    /// into, so identification replies can be reused as translations.
    pub fn new(settings: &TranslationSettings, identify_target: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;
        let runtime = Builder::new_current_thread().enable_all().build()?;

        Ok(Self {
            client,
            runtime,
            endpoint: settings.endpoint.clone(),
            min_identify_chars: settings.min_identify_chars,
            identify_target: normalize_language(identify_target),
            last: Mutex::new(None),
        })
    }

    /// Request a translation, reusing the last reply for the same text and target
    fn cached_request(&self, text: &str, target: &str) -> Result<GoogleResponse, TranslationError> {
        if let Some((last_text, last_target, response)) = self.last.lock().as_ref() {
            if last_text == text && last_target == target {
                debug!("Reusing reply for {:?} -> {}", text, target);
                return Ok(response.clone());
            }
        }

        let response = self.request(text, target)?;
        *self.last.lock() = Some((text.to_string(), target.to_string(), response.clone()));
        Ok(response)
    }

    /// Send one request and parse the reply
    fn request(&self, text: &str, target: &str) -> Result<GoogleResponse, TranslationError> {
        let started = std::time::Instant::now();
        let body: Value = self.runtime.block_on(async {
            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("client", "gtx"),
                    ("sl", "auto"),
                    ("tl", target),
                    ("dt", "t"),
                    ("q", text),
                ])
                .send()
                .await
                .map_err(|e| TranslationError::Service(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TranslationError::Service(format!("HTTP {}", status)));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| TranslationError::Malformed(e.to_string()))
        })?;

        let parsed = parse_response(&body)?;
        debug!(
            "Translated {} chars to {} in {:?} (detected {:?})",
            text.chars().count(),
            target,
            started.elapsed(),
            parsed.detected_language
        );
        Ok(parsed)
    }
}

impl Translator for GoogleTranslate {
    fn translate(&self, text: &str, target: &str) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let response = self.cached_request(text, &normalize_language(target))?;
        if response.translated.trim().is_empty() {
            return Err(TranslationError::Malformed(format!("empty translation for {:?}", text)));
        }
        Ok(response.translated)
    }
}

impl LanguageIdentifier for GoogleTranslate {
    fn identify(&self, text: &str) -> Result<String, IdentifyError> {
        let letters = text.chars().filter(|c| c.is_alphabetic()).count();
        if letters < self.min_identify_chars.max(1) {
            return Err(IdentifyError::AmbiguousOrUnsupported);
        }

        let response = self
            .cached_request(text, &self.identify_target)
            .map_err(|e| IdentifyError::Service(e.to_string()))?;

        match response.detected_language {
            Some(code) if code != "und" && !code.is_empty() => Ok(code),
            _ => Err(IdentifyError::AmbiguousOrUnsupported),
        }
    }
}

/// Parse the nested-array response body
///
/// Shape: `[[["Hello","Hola",...], ...], null, "es", ...]`. The first element
/// lists translated sentence segments, the third the detected source language.
pub fn parse_response(body: &Value) -> Result<GoogleResponse, TranslationError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::Malformed("missing sentence list".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    let detected_language = body.get(2).and_then(Value::as_str).map(normalize_language);

    Ok(GoogleResponse {
        translated,
        detected_language,
    })
}
