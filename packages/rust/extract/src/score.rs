//! Fixed-weight complexity heuristic.
//!
//! Weights are summed in tenths so that the result is an exact multiple of
//! 0.1, then clamped to `[0.0, 1.0]`.

use intake_shared::DocumentMetadata;

/// Extensions of rich office formats.
const HEAVY_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".pptx"];

/// Extensions of legacy or spreadsheet formats.
const MEDIUM_EXTENSIONS: &[&str] = &[".doc", ".xlsx"];

/// Score a document between 0.0 (trivial) and 1.0 (complex).
pub fn complexity_score(metadata: &DocumentMetadata) -> f64 {
    let tenths = word_weight(metadata.word_count)
        + entity_weight(metadata.entities.total())
        + keyword_weight(metadata.keywords.len())
        + extension_weight(&metadata.file_extension);

    (f64::from(tenths) / 10.0).clamp(0.0, 1.0)
}

fn word_weight(words: usize) -> u32 {
    match words {
        w if w > 1000 => 3,
        w if w > 500 => 2,
        w if w > 100 => 1,
        _ => 0,
    }
}

fn entity_weight(entities: usize) -> u32 {
    match entities {
        e if e > 10 => 3,
        e if e > 5 => 2,
        e if e > 0 => 1,
        _ => 0,
    }
}

fn keyword_weight(keywords: usize) -> u32 {
    match keywords {
        k if k > 10 => 2,
        k if k > 5 => 1,
        _ => 0,
    }
}

fn extension_weight(ext: &str) -> u32 {
    if HEAVY_EXTENSIONS.contains(&ext) {
        2
    } else if MEDIUM_EXTENSIONS.contains(&ext) {
        1
    } else {
        0
    }
}
