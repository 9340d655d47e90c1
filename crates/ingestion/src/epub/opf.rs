//! OPF package parsing and metadata normalization.
//!
//! Package documents in the wild express the same field as a bare string,
//! an element with a text node, or an attribute-bearing element, with or
//! without a namespace prefix. Everything is parsed into a small element
//! tree first and then normalized through [`MetaValue`].

use crate::model::ParsedMetadata;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Minimal owned XML element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `dc:title`
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Attribute by qualified or local name
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .or_else(|| self.attributes.iter().find(|(k, _)| local(k) == key))
            .map(|(_, v)| v.as_str())
    }

    /// All descendants in document order
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        fn walk<'a>(el: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
            for child in &el.children {
                out.push(child);
                walk(child, out);
            }
        }
        walk(self, &mut out);
        out
    }

    /// First descendant with the given local name
    pub fn find(&self, local_name: &str) -> Option<&XmlElement> {
        self.descendants()
            .into_iter()
            .find(|el| el.local_name() == local_name)
    }
}

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn element_from(start: &BytesStart<'_>, decoder: Decoder) -> XmlElement {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let attributes = start
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .decode_and_unescape_value(decoder)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect();

    XmlElement {
        name,
        attributes,
        ..Default::default()
    }
}

fn close_into_parent(stack: &mut Vec<XmlElement>) {
    if stack.len() > 1 {
        if let Some(done) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(done);
            }
        }
    }
}

/// Parse an XML string into a synthetic `#document` node holding the root.
///
/// Unclosed elements at end of input are closed implicitly.
pub fn parse_xml(xml: &str) -> Result<XmlElement, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack = vec![XmlElement {
        name: "#document".to_string(),
        ..Default::default()
    }];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from(&e, reader.decoder())),
            Ok(Event::Empty(e)) => {
                let el = element_from(&e, reader.decoder());
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(el);
                }
            }
            Ok(Event::End(_)) => close_into_parent(&mut stack),
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {}",
                    reader.error_position(),
                    e
                ))
            }
        }
    }

    while stack.len() > 1 {
        close_into_parent(&mut stack);
    }

    let document = stack.pop().unwrap_or_default();
    if document.children.is_empty() {
        return Err("document has no root element".to_string());
    }
    Ok(document)
}

/// Path of the package document named by `META-INF/container.xml`
pub fn rootfile_path(container_xml: &str) -> Result<String, String> {
    let doc = parse_xml(container_xml)?;
    doc.descendants()
        .into_iter()
        .filter(|el| el.local_name() == "rootfile")
        .find_map(|el| el.attr("full-path"))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| "no rootfile full-path in container.xml".to_string())
}

/// The shapes a metadata element can take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue<'a> {
    /// `<dc:title>Dune</dc:title>`
    PlainText(&'a str),
    /// `<dc:creator opf:role="aut">Frank Herbert</dc:creator>`
    TextNode {
        text: &'a str,
        attributes: &'a [(String, String)],
    },
    /// `<meta property="dc:date" value="1965"/>`
    AttributeValue(&'a str),
    /// Anything else; the first string attribute is the best guess
    Unknown(&'a [(String, String)]),
}

impl<'a> MetaValue<'a> {
    pub fn classify(el: &'a XmlElement) -> Self {
        let text = el.text.trim();
        if !text.is_empty() {
            if el.attributes.is_empty() {
                return MetaValue::PlainText(text);
            }
            return MetaValue::TextNode {
                text,
                attributes: &el.attributes,
            };
        }
        match el.attr("value").or_else(|| el.attr("content")) {
            Some(value) => MetaValue::AttributeValue(value),
            None => MetaValue::Unknown(&el.attributes),
        }
    }

    pub fn extract(&self) -> Option<String> {
        match self {
            MetaValue::PlainText(text) => plain_text(text),
            MetaValue::TextNode { text, attributes } => text_node(text, attributes),
            MetaValue::AttributeValue(value) => attribute_value(value),
            MetaValue::Unknown(attributes) => first_string_attribute(attributes),
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn plain_text(text: &str) -> Option<String> {
    non_blank(text)
}

fn text_node(text: &str, attributes: &[(String, String)]) -> Option<String> {
    non_blank(text).or_else(|| {
        attributes
            .iter()
            .find(|(k, _)| local(k) == "value")
            .and_then(|(_, v)| non_blank(v))
    })
}

fn attribute_value(value: &str) -> Option<String> {
    non_blank(value)
}

fn first_string_attribute(attributes: &[(String, String)]) -> Option<String> {
    attributes
        .iter()
        .filter(|(k, _)| k != "xmlns" && !k.starts_with("xmlns:"))
        .find_map(|(_, v)| non_blank(v))
}

/// Elements under `metadata` matching `key`.
///
/// Tried in order, first non-empty tier wins: exact name, `dc:` prefixed
/// name, then any prefix (local name).
fn matching_elements<'a>(metadata: &'a XmlElement, key: &str) -> Vec<&'a XmlElement> {
    let all = metadata.descendants();
    let prefixed = format!("dc:{}", key);

    let tiers: [&dyn Fn(&XmlElement) -> bool; 3] = [
        &|el: &XmlElement| el.name == key,
        &|el: &XmlElement| el.name == prefixed,
        &|el: &XmlElement| el.local_name() == key,
    ];

    for is_match in tiers {
        let found: Vec<&XmlElement> = all.iter().copied().filter(|el| is_match(*el)).collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// First normalized value for `key`
pub fn metadata_value(metadata: &XmlElement, key: &str) -> Option<String> {
    matching_elements(metadata, key)
        .into_iter()
        .find_map(|el| MetaValue::classify(el).extract())
}

/// Every normalized value for `key`
pub fn metadata_values(metadata: &XmlElement, key: &str) -> Vec<String> {
    matching_elements(metadata, key)
        .into_iter()
        .filter_map(|el| MetaValue::classify(el).extract())
        .collect()
}

/// One `<item>` of the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: Option<String>,
    pub properties: Option<String>,
}

/// A parsed OPF package document
#[derive(Debug, Clone)]
pub struct OpfPackage {
    /// Archive path of the package document
    pub path: String,
    metadata: XmlElement,
    pub manifest: Vec<ManifestItem>,
    /// Spine idrefs in reading order
    pub spine: Vec<String>,
}

impl OpfPackage {
    pub fn parse(path: &str, xml: &str) -> Result<Self, String> {
        let doc = parse_xml(xml)?;
        let package = doc
            .find("package")
            .ok_or_else(|| "no <package> element".to_string())?;

        let metadata = package.find("metadata").cloned().unwrap_or_default();

        let manifest = package
            .find("manifest")
            .map(|m| {
                m.children
                    .iter()
                    .filter(|el| el.local_name() == "item")
                    .filter_map(|el| {
                        Some(ManifestItem {
                            id: el.attr("id")?.to_string(),
                            href: el.attr("href")?.to_string(),
                            media_type: el.attr("media-type").map(str::to_string),
                            properties: el.attr("properties").map(str::to_string),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let spine = package
            .find("spine")
            .map(|s| {
                s.children
                    .iter()
                    .filter(|el| el.local_name() == "itemref")
                    .filter_map(|el| el.attr("idref").map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            path: path.to_string(),
            metadata,
            manifest,
            spine,
        })
    }

    /// The `<metadata>` element, empty if the package has none
    pub fn metadata_element(&self) -> &XmlElement {
        &self.metadata
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// Directory of the package document, with trailing slash, or empty
    pub fn base_dir(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..=idx],
            None => "",
        }
    }

    /// Archive path of an href relative to the package document
    pub fn resolve_href(&self, href: &str) -> String {
        let href = href.split('#').next().unwrap_or(href);
        let decoded = percent_decode(href);
        let joined = if decoded.starts_with('/') {
            decoded.trim_start_matches('/').to_string()
        } else {
            format!("{}{}", self.base_dir(), decoded)
        };

        let mut parts: Vec<&str> = Vec::new();
        for part in joined.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        parts.join("/")
    }

    /// Normalized metadata with title/author sentinels applied
    pub fn parsed_metadata(&self) -> ParsedMetadata {
        let md = &self.metadata;
        let tags = metadata_values(md, "subject");

        ParsedMetadata {
            description: metadata_value(md, "description"),
            language: metadata_value(md, "language"),
            publisher: metadata_value(md, "publisher"),
            published_date: metadata_value(md, "date"),
            subject: tags.first().cloned(),
            rights: metadata_value(md, "rights"),
            identifier: metadata_value(md, "identifier"),
            tags,
            ..ParsedMetadata::default()
        }
        .with_title_and_author(metadata_value(md, "title"), metadata_value(md, "creator"))
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
