//! Content document selection and chapter extraction

use super::opf::OpfPackage;
use crate::model::Chapter;
use mindpub_common::config::ContentOrderingKind;
use regex_lite::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Navigation document, cover stub and NCX; never chapter text
pub const DENY_LIST: &[&str] = &["nav.xhtml", "cover.xhtml", "toc.ncx"];

/// Extensions treated as content documents
const CONTENT_EXTENSIONS: &[&str] = &[".html", ".xhtml", ".htm"];

/// Whether an archive entry is a candidate content document
pub fn is_content_document(entry: &str) -> bool {
    let lower = entry.to_ascii_lowercase();
    if !CONTENT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return false;
    }
    let file_name = entry.rsplit('/').next().unwrap_or(entry);
    !DENY_LIST.contains(&file_name)
}

/// Strategy that picks and orders the content documents of an archive
pub trait ContentOrdering: Send + Sync {
    fn name(&self) -> &'static str;

    /// `entries` are all archive paths; returns the selected paths in reading order
    fn order(&self, entries: &[String], package: &OpfPackage) -> Vec<String>;
}

/// Content documents sorted lexicographically by archive path
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameOrdering;

impl ContentOrdering for FilenameOrdering {
    fn name(&self) -> &'static str {
        "filename"
    }

    fn order(&self, entries: &[String], _package: &OpfPackage) -> Vec<String> {
        let mut selected: Vec<String> = entries
            .iter()
            .filter(|e| is_content_document(e))
            .cloned()
            .collect();
        selected.sort();
        selected
    }
}

/// Spine reading order, limited to entries present in the archive
#[derive(Debug, Clone, Copy, Default)]
pub struct SpineOrdering;

impl ContentOrdering for SpineOrdering {
    fn name(&self) -> &'static str {
        "spine"
    }

    fn order(&self, entries: &[String], package: &OpfPackage) -> Vec<String> {
        let mut selected = Vec::new();
        for idref in &package.spine {
            let Some(item) = package.manifest_item(idref) else {
                debug!(idref = %idref, "Spine item missing from manifest");
                continue;
            };
            let path = package.resolve_href(&item.href);
            if entries.contains(&path) && is_content_document(&path) && !selected.contains(&path)
            {
                selected.push(path);
            }
        }
        selected
    }
}

/// Spine order, falling back to file names when the spine yields nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct SpineThenFilename;

impl ContentOrdering for SpineThenFilename {
    fn name(&self) -> &'static str {
        "spine_then_filename"
    }

    fn order(&self, entries: &[String], package: &OpfPackage) -> Vec<String> {
        let spine = SpineOrdering.order(entries, package);
        if spine.is_empty() {
            FilenameOrdering.order(entries, package)
        } else {
            spine
        }
    }
}

pub fn ordering_for(kind: ContentOrderingKind) -> Arc<dyn ContentOrdering> {
    match kind {
        ContentOrderingKind::Filename => Arc::new(FilenameOrdering),
        ContentOrderingKind::Spine => Arc::new(SpineOrdering),
        ContentOrderingKind::SpineThenFilename => Arc::new(SpineThenFilename),
    }
}

static NON_CONTENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<head\b[^>]*>.*?</head\s*>|<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>").expect("static regex")
});

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>").expect("static regex")
});

static PARAGRAPH_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</p\s*>").expect("static regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]*>").expect("static regex")
});

static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t\r\x0c]+").expect("static regex")
});

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}").expect("static regex")
});

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h([12])[^>]*>(.*?)</h[12]\s*>").expect("static regex")
});

static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("static regex")
});

static CHAPTER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:chapter)\s+([0-9]+|[IVXLCDM]+)\b\.?\s*(.*)$").expect("static regex")
});

static CHAPTER_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?i:chapter)\s+([0-9]+|[IVXLCDM]+)\b\.?[ \t]*([^\n]*)").expect("static regex")
});

static NUMBERED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+)\.\s+(.+)$").expect("static regex")
});


fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, "").into_owned()
}

/// Convert an XHTML document into plain text.
///
/// Line breaks and paragraph ends become newlines, remaining tags are
/// dropped, common entities are decoded, space runs collapse to one space
/// and runs of blank lines collapse to a single blank line.
pub fn clean_html(html: &str) -> String {
    let text = NON_CONTENT_BLOCK.replace_all(html, "");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = PARAGRAPH_END.replace_all(&text, "\n");
    let text = decode_entities(&strip_tags(&text));
    let text = SPACE_RUN.replace_all(&text, " ");

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_LINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Chapter number from digits or a Roman numeral up to XII, otherwise 1
pub fn parse_chapter_number(label: &str) -> u32 {
    let label = label.trim().trim_end_matches('.');
    if let Ok(n) = label.parse::<u32>() {
        return n;
    }
    match label.to_ascii_uppercase().as_str() {
        "I" => 1,
        "II" => 2,
        "III" => 3,
        "IV" => 4,
        "V" => 5,
        "VI" => 6,
        "VII" => 7,
        "VIII" => 8,
        "IX" => 9,
        "X" => 10,
        "XI" => 11,
        "XII" => 12,
        _ => 1,
    }
}

fn single_line(text: &str) -> String {
    decode_entities(&strip_tags(text))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn label_and_title(heading: &str) -> Option<(u32, String)> {
    let caps = CHAPTER_LABEL.captures(heading)?;
    let number = parse_chapter_number(&caps[1]);
    let title = caps[2].trim();
    let title = if title.is_empty() {
        heading.to_string()
    } else {
        title.to_string()
    };
    Some((number, title))
}

/// Chapter number and title for a content document.
///
/// Tried in order: an `<h1>`/`<h2>` reading `CHAPTER <n>. <title>`, the
/// `<title>` element, a line of the cleaned text starting `CHAPTER <n>`
/// (only the word itself is case-insensitive), then a
/// leading `<n>. <title>` line.
pub fn detect_heading(html: &str, cleaned: &str) -> Option<(u32, String)> {
    for caps in HEADING.captures_iter(html) {
        if let Some(found) = label_and_title(&single_line(&caps[2])) {
            return Some(found);
        }
    }

    if let Some(caps) = TITLE.captures(html) {
        let title = single_line(&caps[1]);
        if !title.is_empty() {
            let number = label_and_title(&title).map_or(1, |(n, _)| n);
            return Some((number, title));
        }
    }

    if let Some(caps) = CHAPTER_IN_TEXT.captures(cleaned) {
        let number = parse_chapter_number(&caps[1]);
        let rest = caps[2].trim();
        let title = if rest.is_empty() {
            format!("Chapter {}", number)
        } else {
            rest.to_string()
        };
        return Some((number, title));
    }

    let first_line = cleaned.lines().find(|l| !l.trim().is_empty())?;
    let caps = NUMBERED_LINE.captures(first_line)?;
    Some((parse_chapter_number(&caps[1]), caps[2].trim().to_string()))
}

/// Build a chapter from one content document; `None` if it has no text.
///
/// `ordinal` is the 1-based position of the document in reading order and
/// names the chapter when no heading is found.
pub fn extract_chapter(source: &str, html: &str, ordinal: usize) -> Option<Chapter> {
    let content = clean_html(html);
    if content.is_empty() {
        debug!(source = %source, "Content document empty after cleaning, skipped");
        return None;
    }

    let (number, title) = detect_heading(html, &content)
        .unwrap_or_else(|| (1, format!("Chapter {}", ordinal)));

    Some(Chapter {
        number,
        title,
        content,
        source: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> OpfPackage {
        let opf = r#"<package>
          <manifest>
            <item id="b" href="text/b.xhtml" media-type="application/xhtml+xml"/>
            <item id="a" href="text/a.xhtml" media-type="application/xhtml+xml"/>
            <item id="ghost" href="text/ghost.xhtml" media-type="application/xhtml+xml"/>
          </manifest>
          <spine><itemref idref="b"/><itemref idref="ghost"/><itemref idref="a"/></spine>
        </package>"#;
        OpfPackage::parse("OEBPS/content.opf", opf).unwrap()
    }

    fn entries() -> Vec<String> {
        [
            "mimetype",
            "META-INF/container.xml",
            "OEBPS/content.opf",
            "OEBPS/text/b.xhtml",
            "OEBPS/text/a.xhtml",
            "OEBPS/nav.xhtml",
            "OEBPS/toc.ncx",
            "OEBPS/text/cover.xhtml",
            "OEBPS/text/notes.htm",
            "OEBPS/images/pic.png",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn test_deny_list_matches_file_name_only() {
        assert!(!is_content_document("OEBPS/nav.xhtml"));
        assert!(!is_content_document("cover.xhtml"));
        assert!(is_content_document("OEBPS/toc.xhtml"));
        assert!(is_content_document("OEBPS/my-nav.xhtml"));
        assert!(is_content_document("OEBPS/discover.xhtml"));
        assert!(is_content_document("OEBPS/CH1.HTML"));
        assert!(!is_content_document("OEBPS/styles.css"));
    }

    #[test]
    fn test_filename_ordering() {
        let ordered = FilenameOrdering.order(&entries(), &package());
        assert_eq!(
            ordered,
            vec!["OEBPS/text/a.xhtml", "OEBPS/text/b.xhtml", "OEBPS/text/notes.htm"]
        );
    }

    #[test]
    fn test_spine_ordering() {
        let ordered = SpineOrdering.order(&entries(), &package());
        assert_eq!(ordered, vec!["OEBPS/text/b.xhtml", "OEBPS/text/a.xhtml"]);
    }

    #[test]
    fn test_spine_falls_back_to_filename() {
        let empty_spine = OpfPackage::parse("content.opf", "<package/>").unwrap();
        let ordered = SpineThenFilename.order(&entries(), &empty_spine);
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordering_for(ContentOrderingKind::Spine).name(), "spine");
    }

    #[test]
    fn test_clean_html() {
        let html = "<html><head><title>T</title><style>p{}</style></head><body>\
                    <p>One&nbsp;&amp;   two</p>\n\n\n\n<p>Three<br/>four &lt;5&gt; &quot;q&quot; it&#39;s</p>\
                    </body></html>";
        assert_eq!(
            clean_html(html),
            "One & two\n\nThree\nfour <5> \"q\" it's"
        );

        let spaced = "<p>a</p>\n\n\n\n\n<p>b</p>";
        assert_eq!(clean_html(spaced), "a\n\nb");
        assert_eq!(clean_html("<div> <img src='x.png'/> </div>"), "");
        assert_eq!(clean_html("<header>Kept</header>"), "Kept");
    }

    #[test]
    fn test_chapter_numbers() {
        assert_eq!(parse_chapter_number("7"), 7);
        assert_eq!(parse_chapter_number("iv"), 4);
        assert_eq!(parse_chapter_number("XII"), 12);
        assert_eq!(parse_chapter_number("XIV"), 1);
        assert_eq!(parse_chapter_number("seven"), 1);
    }

    #[test]
    fn test_heading_from_h1() {
        let html = "<title>Ignored</title><h1>CHAPTER IV. The Storm</h1><p>Rain.</p>";
        assert_eq!(
            detect_heading(html, &clean_html(html)),
            Some((4, "The Storm".to_string()))
        );
    }

    #[test]
    fn test_heading_from_title_element() {
        let html = "<html><head><title>Prologue</title></head><body><p>Once.</p></body></html>";
        assert_eq!(
            detect_heading(html, &clean_html(html)),
            Some((1, "Prologue".to_string()))
        );
    }

    #[test]
    fn test_heading_from_text() {
        let html = "<p>Chapter 3</p><p>It began.</p>";
        assert_eq!(
            detect_heading(html, &clean_html(html)),
            Some((3, "Chapter 3".to_string()))
        );

        let html = "<p>12. The Long Road</p><p>Walking.</p>";
        assert_eq!(
            detect_heading(html, &clean_html(html)),
            Some((12, "The Long Road".to_string()))
        );
    }

    #[test]
    fn test_chapter_word_in_prose_is_not_a_heading() {
        let html = "<p>As the previous chapter did explain, rain fell all day.</p>";
        let chapter = extract_chapter("OEBPS/x.xhtml", html, 4).unwrap();
        assert_eq!(chapter.number, 1);
        assert_eq!(chapter.title, "Chapter 4");

        let html = "<p>Chapter civil unrest grew.</p><p>Then quiet.</p>";
        assert_eq!(detect_heading(html, &clean_html(html)), None);

        let html = "<p>Foreword</p><p>CHAPTER XI</p><p>Snow.</p>";
        assert_eq!(
            detect_heading(html, &clean_html(html)),
            Some((11, "Chapter 11".to_string()))
        );
    }

    #[test]
    fn test_extract_chapter_fallback_title() {
        let chapter = extract_chapter("OEBPS/x.xhtml", "<p>just words here</p>", 5).unwrap();
        assert_eq!(chapter.number, 1);
        assert_eq!(chapter.title, "Chapter 5");
        assert_eq!(chapter.content, "just words here");

        assert!(extract_chapter("OEBPS/blank.xhtml", "<div><br/></div>", 1).is_none());
    }
}
