//! Plain text passes through untouched.

use intake_shared::Result;

use super::TextExtractor;

/// Identity extractor for `text/plain`.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn detect(&self, content_type: &str) -> bool {
        content_type == "text/plain"
    }

    fn extract(&self, content: &str) -> Result<String> {
        Ok(content.to_string())
    }

    fn name(&self) -> &str {
        "plain"
    }
}
