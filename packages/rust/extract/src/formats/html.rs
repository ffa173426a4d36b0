//! HTML extractor: visible text only.

use scraper::Html;

use intake_shared::Result;

use super::TextExtractor;

/// Elements whose text never reaches the reader.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "nav", "head", "template", "svg"];

/// Extracts the visible text of `text/html` objects, whitespace-collapsed.
pub struct HtmlExtractor;

impl TextExtractor for HtmlExtractor {
    fn detect(&self, content_type: &str) -> bool {
        content_type == "text/html" || content_type == "application/xhtml+xml"
    }

    fn extract(&self, content: &str) -> Result<String> {
        let doc = Html::parse_document(content);
        let mut words: Vec<&str> = Vec::new();

        for node in doc.root_element().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
            });
            if !hidden {
                words.extend(text.split_whitespace());
            }
        }

        Ok(words.join(" "))
    }

    fn name(&self) -> &str {
        "html"
    }
}
