//! CSV extractor: keeps a short preview of the leading rows.

use intake_shared::Result;

use super::TextExtractor;

/// Number of lines kept from a CSV object.
pub const CSV_PREVIEW_LINES: usize = 10;

/// Keeps the first [`CSV_PREVIEW_LINES`] lines of `text/csv` objects.
pub struct CsvExtractor;

impl TextExtractor for CsvExtractor {
    fn detect(&self, content_type: &str) -> bool {
        content_type == "text/csv"
    }

    fn extract(&self, content: &str) -> Result<String> {
        Ok(content
            .split('\n')
            .take(CSV_PREVIEW_LINES)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn name(&self) -> &str {
        "csv"
    }
}
