//! Format extractor trait and built-in extractors.
//!
//! Extractors turn the raw text of an uploaded object into the text that gets
//! analysed and indexed. Each one claims a content type; [`PreviewExtractor`]
//! claims everything and is always tried last.

mod csv;
mod html;
mod json;
mod plain;
mod preview;

use intake_shared::Result;

pub use csv::CsvExtractor;
pub use html::HtmlExtractor;
pub use json::JsonExtractor;
pub use plain::PlainTextExtractor;
pub use preview::PreviewExtractor;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait for content-type specific text extraction.
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor handles the (normalized) content type.
    fn detect(&self, content_type: &str) -> bool;

    /// Produce the text to analyse.
    fn extract(&self, content: &str) -> Result<String>;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered extractors in priority order.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Create a registry with all built-in extractors (specific first, preview last).
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Box::new(JsonExtractor),
                Box::new(PlainTextExtractor),
                Box::new(CsvExtractor),
                Box::new(HtmlExtractor),
                Box::new(PreviewExtractor),
            ],
        }
    }

    /// Pick the extractor for a content type.
    /// Always returns an extractor (PreviewExtractor is the fallback).
    pub fn detect(&self, content_type: &str) -> &dyn TextExtractor {
        let normalized = normalize_content_type(content_type);
        for extractor in &self.extractors {
            if extractor.detect(&normalized) {
                return extractor.as_ref();
            }
        }
        unreachable!("PreviewExtractor must always match");
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower-case the media type and drop parameters such as `charset`.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Borrow at most `max_chars` characters from the start of `s`.
pub(crate) fn take_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_content_type() {
        let registry = ExtractorRegistry::new();
        assert_eq!(registry.detect("application/json").name(), "json");
        assert_eq!(registry.detect("text/plain").name(), "plain");
        assert_eq!(registry.detect("text/csv").name(), "csv");
        assert_eq!(registry.detect("text/html").name(), "html");
        assert_eq!(registry.detect("application/pdf").name(), "preview");
        assert_eq!(registry.detect("").name(), "preview");
    }

    #[test]
    fn detect_ignores_parameters_and_case() {
        let registry = ExtractorRegistry::new();
        assert_eq!(registry.detect("Text/Plain; charset=utf-8").name(), "plain");
        assert_eq!(normalize_content_type(" APPLICATION/JSON ;x=y"), "application/json");
    }

    #[test]
    fn take_chars_respects_char_boundaries() {
        assert_eq!(take_chars("héllo", 2), "hé");
        assert_eq!(take_chars("abc", 10), "abc");
        assert_eq!(take_chars("", 3), "");
    }
}
