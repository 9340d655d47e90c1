//! Word-based pagination
//!
//! Splits text into fixed-size page units. Greedy, no look-ahead, so the
//! same input always produces the same boundaries.

use crate::model::Page;
use tracing::debug;

/// Default words per page
pub const DEFAULT_WORDS_PER_PAGE: usize = 300;

/// A run of consecutive words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordChunk {
    /// 1-based position within the split
    pub number: u32,
    /// Words joined by single spaces
    pub content: String,
    pub word_count: usize,
}

/// Split `text` on whitespace runs into chunks of exactly `words_per_page`
/// words; the last chunk may be shorter. Zero selects the default size.
pub fn split_words(text: &str, words_per_page: usize) -> Vec<WordChunk> {
    let size = if words_per_page == 0 {
        DEFAULT_WORDS_PER_PAGE
    } else {
        words_per_page
    };

    let words: Vec<&str> = text.split_whitespace().collect();
    let chunks: Vec<WordChunk> = words
        .chunks(size)
        .enumerate()
        .map(|(i, group)| WordChunk {
            number: i as u32 + 1,
            content: group.join(" "),
            word_count: group.len(),
        })
        .collect();

    debug!(
        word_count = words.len(),
        chunk_count = chunks.len(),
        words_per_page = size,
        "Text split into pages"
    );

    chunks
}

/// Page numbering across a whole document.
///
/// Each call to [`Paginator::push_chapter`] starts on a fresh page, so a
/// chapter never shares a page with the one before it.
#[derive(Debug)]
pub struct Paginator {
    words_per_page: usize,
    pages: Vec<Page>,
}

impl Paginator {
    pub fn new(words_per_page: usize) -> Self {
        Self {
            words_per_page,
            pages: Vec::new(),
        }
    }

    /// Append a chapter's pages, each prefixed with a `[CHAPTER: title]` marker
    pub fn push_chapter(&mut self, number: u32, title: &str, text: &str) -> usize {
        let chunks = split_words(text, self.words_per_page);
        let added = chunks.len();

        for chunk in chunks {
            let page_number = self.pages.len() as u32 + 1;
            self.pages.push(Page {
                page_number,
                content: format!("[CHAPTER: {}]\n\n{}", title, chunk.content),
                chapter_number: Some(number),
                chapter_title: Some(title.to_string()),
            });
        }

        added
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_chunk_counts() {
        for (k, r) in [(1usize, 0usize), (2, 17), (3, 299), (0, 5)] {
            let text = words(300 * k + r);
            let chunks = split_words(&text, 300);
            let expected = if r > 0 { k + 1 } else { k };
            assert_eq!(chunks.len(), expected, "k={} r={}", k, r);
        }
    }

    #[test]
    fn test_concatenation_reproduces_words() {
        let text = words(731);
        let chunks = split_words(&text, 300);

        let rejoined: Vec<String> = chunks
            .iter()
            .flat_map(|c| c.content.split(' ').map(str::to_string))
            .collect();
        let original: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        assert_eq!(rejoined, original);

        assert_eq!(chunks[0].word_count, 300);
        assert_eq!(chunks[2].word_count, 131);
        assert_eq!(chunks.iter().map(|c| c.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        let chunks = split_words("  one\n\n two\tthree   four ", 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "one two");
        assert_eq!(chunks[1].content, "three four");
    }

    #[test]
    fn test_empty_text() {
        assert!(split_words("", 300).is_empty());
        assert!(split_words(" \n\t ", 300).is_empty());
    }

    #[test]
    fn test_zero_uses_default() {
        let chunks = split_words(&words(301), 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].word_count, DEFAULT_WORDS_PER_PAGE);
    }

    #[test]
    fn test_chapters_start_on_new_page() {
        let mut paginator = Paginator::new(300);
        assert_eq!(paginator.push_chapter(1, "One", &words(450)), 2);
        assert_eq!(paginator.push_chapter(2, "Two", &words(50)), 1);

        let pages = paginator.into_pages();
        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages.iter().map(|p| p.page_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(pages[1].chapter_number, Some(1));
        assert_eq!(pages[2].chapter_number, Some(2));
        assert!(pages[2].content.starts_with("[CHAPTER: Two]\n\n"));
        assert_eq!(
            pages[2].content.trim_start_matches("[CHAPTER: Two]\n\n").split(' ').count(),
            50
        );
    }
}
