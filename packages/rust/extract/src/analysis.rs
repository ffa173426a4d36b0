//! Text analysis: counts, keywords, and pattern-based entities.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use intake_shared::{DocumentMetadata, Entities};

/// Number of keywords kept per document.
pub const MAX_KEYWORDS: usize = 10;

/// Words that mark a document as business correspondence.
const BUSINESS_LEXICON: &[&str] = &[
    "agreement",
    "budget",
    "contract",
    "deliverable",
    "deliverables",
    "estimate",
    "invoice",
    "order",
    "payment",
    "pricing",
    "proposal",
    "purchase",
    "quote",
    "scope",
    "timeline",
];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b").expect("valid regex")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{3}[-.]?[0-9]{3}[-.]?[0-9]{4}\b").expect("valid regex"));

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"http[s]?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\\(\\),]|(?:%[0-9a-fA-F][0-9a-fA-F]))+",
    )
    .expect("valid regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[0-9]{1,2}[/-][0-9]{1,2}[/-][0-9]{2,4}\b").expect("valid regex")
});

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$[0-9]+(?:,[0-9]{3})*(?:\.[0-9]{2})?").expect("valid regex")
});

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("valid regex"));

/// Build the full metadata record for extracted text.
pub fn extract_metadata(text: &str, filename: &str) -> DocumentMetadata {
    DocumentMetadata {
        word_count: text.split_whitespace().count(),
        character_count: text.chars().count(),
        line_count: if text.is_empty() {
            0
        } else {
            text.split('\n').count()
        },
        file_extension: file_extension(filename),
        has_email: EMAIL_RE.is_match(text),
        has_phone: PHONE_RE.is_match(text),
        has_url: URL_RE.is_match(text),
        has_business_keywords: has_business_keywords(text),
        language_detected: "en".to_string(),
        keywords: extract_keywords(text),
        entities: extract_entities(text),
    }
}

/// Lower-cased extension with its leading dot, or `""`.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Most frequent repeated words (3+ ASCII letters), most frequent first.
///
/// Ties keep first-occurrence order; words seen only once are dropped after
/// the top [`MAX_KEYWORDS`] cut.
pub fn extract_keywords(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let lowered = text.to_lowercase();
    let mut order: Vec<&str> = Vec::new();
    let mut freq: HashMap<&str, usize> = HashMap::new();

    for m in WORD_RE.find_iter(&lowered) {
        let count = freq.entry(m.as_str()).or_insert(0);
        if *count == 0 {
            order.push(m.as_str());
        }
        *count += 1;
    }

    let mut ranked: Vec<(&str, usize)> = order.into_iter().map(|w| (w, freq[w])).collect();
    // Stable sort keeps first-occurrence order among equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(MAX_KEYWORDS)
        .filter(|(_, count)| *count > 1)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// All pattern matches, in order of appearance.
pub fn extract_entities(text: &str) -> Entities {
    let collect = |re: &Regex| re.find_iter(text).map(|m| m.as_str().to_string()).collect();

    Entities {
        emails: collect(&EMAIL_RE),
        phones: collect(&PHONE_RE),
        urls: collect(&URL_RE),
        dates: collect(&DATE_RE),
        amounts: collect(&AMOUNT_RE),
    }
}

/// Whether any word of the business lexicon occurs in the text.
pub fn has_business_keywords(text: &str) -> bool {
    let lowered = text.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .any(|m| BUSINESS_LEXICON.contains(&m.as_str()))
}
