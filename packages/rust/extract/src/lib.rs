//! Text extraction and analysis for uploaded documents.
//!
//! Turns raw object bytes into analysable text, derives [`DocumentMetadata`]
//! from it, and scores its complexity.
//!
//! [`DocumentMetadata`]: intake_shared::DocumentMetadata

pub mod analysis;
pub mod formats;
pub mod score;

use intake_shared::{IntakeError, Result};

pub use analysis::{extract_entities, extract_keywords, extract_metadata, has_business_keywords};
pub use formats::{ExtractorRegistry, TextExtractor, normalize_content_type};
pub use score::complexity_score;

/// Characters kept when a format-specific extractor fails.
pub const FALLBACK_CHARS: usize = 500;

/// Decode object bytes as strict UTF-8.
pub fn decode_utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| IntakeError::parse(format!("object is not valid UTF-8: {e}")))
}

/// Produce the text to analyse for `content` declared as `content_type`.
///
/// Never fails: when the matching extractor rejects the content, the first
/// [`FALLBACK_CHARS`] characters are returned instead.
pub fn extract_text(content: &str, content_type: &str) -> String {
    extract_text_with(&ExtractorRegistry::new(), content, content_type)
}

/// [`extract_text`] against an existing registry.
pub fn extract_text_with(registry: &ExtractorRegistry, content: &str, content_type: &str) -> String {
    let extractor = registry.detect(content_type);
    match extractor.extract(content) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(
                extractor = extractor.name(),
                content_type,
                error = %e,
                "extraction failed, falling back to raw prefix"
            );
            formats::take_chars(content, FALLBACK_CHARS).to_string()
        }
    }
}
