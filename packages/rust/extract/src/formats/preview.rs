//! Fallback extractor for every other content type.

use intake_shared::Result;

use super::{TextExtractor, take_chars};

/// Characters kept by the preview extractor.
pub const PREVIEW_CHARS: usize = 1000;

/// Truncates unknown formats to a [`PREVIEW_CHARS`] preview.
/// Always matches as the lowest-priority fallback.
pub struct PreviewExtractor;

impl TextExtractor for PreviewExtractor {
    fn detect(&self, _content_type: &str) -> bool {
        true
    }

    fn extract(&self, content: &str) -> Result<String> {
        let head = take_chars(content, PREVIEW_CHARS);
        if head.len() < content.len() {
            Ok(format!("{head}..."))
        } else {
            Ok(content.to_string())
        }
    }

    fn name(&self) -> &str {
        "preview"
    }
}
