//! HTML to bounded plain text.
//!
//! Best-effort boilerplate filter: it removes the listed tags and the
//! listed class/id patterns, nothing more. Callers must not read it as a
//! guaranteed content/boilerplate separator.

use html_scraper::{ElementRef, Html, Node, Selector};

/// Elements dropped wholesale, subtree included.
const TAG_DENYLIST: [&str; 16] = [
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "form", "button",
    "meta", "link", "svg", "img", "video", "audio",
];

/// Case-insensitive substrings that disqualify an element via its class or
/// id attribute.
const NON_CONTENT_TOKENS: [&str; 10] = [
    "nav",
    "footer",
    "header",
    "sidebar",
    "menu",
    "ad",
    "advertisement",
    "cookie",
    "popup",
    "modal",
];

/// Marker appended to truncated content.
pub const ELLIPSIS: &str = "...";

fn class_or_id_lc(el: &ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_denied(el: &ElementRef) -> bool {
    if TAG_DENYLIST.contains(&el.value().name()) {
        return true;
    }
    let s = class_or_id_lc(el);
    !s.is_empty() && NON_CONTENT_TOKENS.iter().any(|t| s.contains(t))
}

/// Extract visible text from the document body, skipping denied subtrees,
/// with whitespace collapsed to single spaces and the ends trimmed.
///
/// Running the result through the normalizer again returns it unchanged.
pub fn clean_html(doc: &Html) -> String {
    let root = body_element(doc);
    let mut parts: Vec<&str> = Vec::new();
    match root {
        Some(el) => collect_visible_text(*el, &mut parts),
        None => collect_visible_text(*doc.root_element(), &mut parts),
    }
    norm_ws(&parts.join(" "))
}

fn body_element(doc: &Html) -> Option<ElementRef<'_>> {
    let sel = Selector::parse("body").ok()?;
    doc.select(&sel).next()
}

fn collect_visible_text<'a>(
    node: ego_tree::NodeRef<'a, Node>,
    out: &mut Vec<&'a str>,
) {
    for child in node.children() {
        match child.value() {
            Node::Text(t) => out.push(&**t),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    if !is_denied(&el) {
                        collect_visible_text(child, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first `<title>` element, trimmed; empty string if absent.
pub fn document_title(doc: &Html) -> String {
    let Ok(sel) = Selector::parse("title") else {
        return String::new();
    };
    doc.select(&sel)
        .next()
        .map(|el| norm_ws(&el.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

/// Bound `text` to `max_chars` characters.
///
/// Returns `(content, original_length, truncated)` where `original_length`
/// is the pre-truncation char count. Truncated content carries a literal
/// ellipsis marker on top of the cap. Char-based so multibyte text never
/// splits a code point.
pub fn truncate_content(text: &str, max_chars: usize) -> (String, usize, bool) {
    let original_length = text.chars().count();
    if original_length <= max_chars {
        return (text.to_string(), original_length, false);
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    (out, original_length, true)
}
