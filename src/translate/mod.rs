//! Translation Layer
//!
//! Contracts for the two language services the frame pipeline consumes:
//! identifying the language of a piece of text and translating it. Both are
//! black boxes to the pipeline; `GoogleTranslate` implements them over HTTP.

pub mod google;

use std::sync::Arc;
use thiserror::Error;

pub use google::GoogleTranslate;

/// Language code used when the identifier has no answer
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Language identification failures
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// The text was too short or mixed to pin down a language
    #[error("language is ambiguous or unsupported")]
    AmbiguousOrUnsupported,
    /// The identification service could not be reached
    #[error("language identification service failed: {0}")]
    Service(String),
}

/// Translation failures
#[derive(Debug, Error)]
pub enum TranslationError {
    /// Network, quota or HTTP-level failure
    #[error("translation service error: {0}")]
    Service(String),
    /// The service answered with something we could not read
    #[error("unexpected translation response: {0}")]
    Malformed(String),
}

/// Guesses the language of a piece of text
pub trait LanguageIdentifier: Send + Sync {
    /// Return a normalized language code such as "es" or "zh-cn"
    fn identify(&self, text: &str) -> Result<String, IdentifyError>;
}

/// Translates text into a target language
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, target: &str) -> Result<String, TranslationError>;

    /// Translate several texts, preserving order and length
    ///
    /// The default translates one text at a time; any failure fails the batch.
    fn translate_batch(&self, texts: &[String], target: &str) -> Result<Vec<String>, TranslationError> {
        texts.iter().map(|text| self.translate(text, target)).collect()
    }
}

impl<T: LanguageIdentifier + ?Sized> LanguageIdentifier for Arc<T> {
    fn identify(&self, text: &str) -> Result<String, IdentifyError> {
        (**self).identify(text)
    }
}

impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, text: &str, target: &str) -> Result<String, TranslationError> {
        (**self).translate(text, target)
    }

    fn translate_batch(&self, texts: &[String], target: &str) -> Result<Vec<String>, TranslationError> {
        (**self).translate_batch(texts, target)
    }
}

/// Normalize a language code for comparison ("ES " -> "es", "zh_CN" -> "zh-cn")
pub fn normalize_language(code: &str) -> String {
    code.trim().to_ascii_lowercase().replace('_', "-")
}

/// Whether two codes name the same language
///
/// Regional variants count as the same language ("en-us" matches "en"), except
/// for Chinese where the script variant changes the written text.
pub fn same_language(a: &str, b: &str) -> bool {
    let a = normalize_language(a);
    let b = normalize_language(b);
    if a == b {
        return true;
    }

    let primary = |code: &str| code.split('-').next().unwrap_or_default().to_string();
    let (pa, pb) = (primary(&a), primary(&b));
    if pa != pb || pa == "zh" {
        return false;
    }
    // Only a bare code matches its regional variants
    !a.contains('-') || !b.contains('-')
}
