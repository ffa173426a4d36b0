//! JSON extractor: re-serializes the document with stable indentation.

use intake_shared::{IntakeError, Result};

use super::TextExtractor;

/// Pretty-prints `application/json` objects.
pub struct JsonExtractor;

impl TextExtractor for JsonExtractor {
    fn detect(&self, content_type: &str) -> bool {
        content_type == "application/json"
    }

    fn extract(&self, content: &str) -> Result<String> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| IntakeError::parse(format!("invalid JSON: {e}")))?;
        serde_json::to_string_pretty(&value)
            .map_err(|e| IntakeError::parse(format!("JSON re-serialization failed: {e}")))
    }

    fn name(&self) -> &str {
        "json"
    }
}
