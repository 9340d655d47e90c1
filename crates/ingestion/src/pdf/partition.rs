//! Split extracted PDF text across a known number of pages

use crate::model::Page;

/// Content for a page with no recoverable text
pub fn placeholder(page_number: u32) -> String {
    format!("Page {} (No text content available)", page_number)
}

/// Where a non-final page ends: just after the last paragraph break in
/// the final 30% of `[start, nominal_end)`, or at `nominal_end`.
fn backed_off_end(chars: &[char], start: usize, nominal_end: usize) -> usize {
    let len = nominal_end - start;
    let window_start = start + len * 7 / 10;

    let mut i = nominal_end;
    while i >= window_start + 2 {
        if chars[i - 2] == '\n' && chars[i - 1] == '\n' {
            return i;
        }
        i -= 1;
    }
    nominal_end
}

/// Partition `text` into exactly `total_pages` contiguous slices.
///
/// Page `i` nominally owns characters `[ceil((i-1)L/N), ceil(iL/N))`.
/// Slices are raw, whitespace included; only zero-length slices become
/// placeholders, so concatenating every non-placeholder page gives back
/// `text`.
pub fn partition_text(text: &str, total_pages: u32) -> Vec<Page> {
    let n = total_pages as usize;
    let page = |number: u32, content: String| Page {
        page_number: number,
        content,
        chapter_number: None,
        chapter_title: None,
    };

    if text.trim().is_empty() {
        return (1..=total_pages).map(|i| page(i, placeholder(i))).collect();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut pages = Vec::with_capacity(n);
    let mut start = 0usize;

    for i in 1..=n {
        let nominal_end = (i * len).div_ceil(n);
        let end = if i == n {
            len
        } else {
            backed_off_end(&chars, start, nominal_end.max(start))
        };

        let slice: String = chars[start..end].iter().collect();
        let number = i as u32;
        if slice.is_empty() {
            pages.push(page(number, placeholder(number)));
        } else {
            pages.push(page(number, slice));
        }
        start = end;
    }

    pages
}
