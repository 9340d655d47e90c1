//! Page-count fallback cascade
//!
//! Primary parsers frequently report zero pages for damaged or unusual
//! files. Each stage here runs only when everything before it came up
//! empty; the first non-zero answer wins.

use super::backend::{dict_entry, PrimaryParse};
use crate::model::PageCountSource;
use lopdf::{Document, Object};
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::debug;

static COUNT_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/Count\s+(\d+)").expect("static regex")
});

static TYPE_PAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/Type\s*/Pages?").expect("static regex")
});

/// `/Count` of the page tree root, via the structural loader
pub fn page_tree_count(data: &[u8]) -> u32 {
    let Ok(doc) = Document::load_mem(data) else {
        return 0;
    };
    let Some(Object::Dictionary(root)) = dict_entry(&doc, &doc.trailer, b"Root") else {
        return 0;
    };
    let Some(Object::Dictionary(pages)) = dict_entry(&doc, root, b"Pages") else {
        return 0;
    };
    match dict_entry(&doc, pages, b"Count") {
        Some(Object::Integer(n)) if *n > 0 => u32::try_from(*n).unwrap_or(0),
        _ => 0,
    }
}

/// Largest `/Count <n>` anywhere in the raw bytes
pub fn max_count_entry(data: &[u8]) -> u32 {
    let raw = String::from_utf8_lossy(data);
    COUNT_ENTRY
        .captures_iter(&raw)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Occurrences of `/Type /Page`, not counting `/Type /Pages`
pub fn page_object_count(data: &[u8]) -> u32 {
    let raw = String::from_utf8_lossy(data);
    TYPE_PAGE
        .find_iter(&raw)
        .filter(|m| !m.as_str().ends_with('s'))
        .count() as u32
}

/// `ceil(chars / chars_per_page)` when any text was recovered
pub fn text_estimate(text: &str, chars_per_page: usize) -> u32 {
    if text.trim().is_empty() || chars_per_page == 0 {
        return 0;
    }
    let chars = text.chars().count();
    chars.div_ceil(chars_per_page) as u32
}

/// Resolve the total page count and the stage that produced it.
///
/// `None` when every stage yields zero.
pub fn resolve_page_count(
    data: &[u8],
    primary: &PrimaryParse,
    chars_per_page: usize,
) -> Option<(u32, PageCountSource)> {
    let stages: [(PageCountSource, &dyn Fn() -> u32); 6] = [
        (PageCountSource::Primary, &|| primary.page_count),
        (PageCountSource::PageTree, &|| page_tree_count(data)),
        (PageCountSource::CountEntries, &|| max_count_entry(data)),
        (PageCountSource::PageObjects, &|| page_object_count(data)),
        (PageCountSource::TextEstimate, &|| {
            text_estimate(&primary.text, chars_per_page)
        }),
        (PageCountSource::ContentSegments, &|| primary.segments as u32),
    ];

    for (source, stage) in stages {
        let count = stage();
        debug!(?source, count, "Page count stage");
        if count > 0 {
            return Some((count, source));
        }
    }
    None
}
