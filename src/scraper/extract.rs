//! Readable-text extraction from raw HTML.
//!
//! Boilerplate elements are cut out before parsing, the main content area
//! is located via a selector priority list, and the surviving text is
//! tidied and clipped to a character limit.

use scraper::{Html, Selector};

/// Elements removed wholesale, content included, before parsing.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe",
];

/// Content containers tried in order; the first non-empty match wins.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".content",
    "#content",
    ".post",
    ".article",
    "body",
];

/// Extracted text and title before any acceptance checks.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub title: String,
    pub text: String,
}

/// Extract readable text from raw HTML, clipped at `max_chars` bytes on a
/// character boundary.
///
/// Returns `None` when no non-whitespace content survives extraction.
pub fn extract_text(html: &str, max_chars: usize) -> Option<Extraction> {
    let document = Html::parse_document(&strip_boilerplate(html));

    let text = tidy_whitespace(&main_text(&document));
    if text.is_empty() {
        return None;
    }

    Some(Extraction {
        title: page_title(&document),
        text: clip_chars(&text, max_chars),
    })
}

fn page_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|el| el.text().collect::<String>().trim().to_owned())
        .unwrap_or_default()
}

fn main_text(document: &Html) -> String {
    CONTENT_SELECTORS
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .filter_map(|selector| document.select(&selector).next())
        .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_owned())
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// Cut boilerplate elements out of the markup in a single pass.
///
/// The scan runs over an ASCII-lowercased shadow of the input, which keeps
/// byte offsets identical, so slices can be copied from the original with
/// casing intact.
fn strip_boilerplate(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut kept = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(offset) = lower[pos..].find('<') {
        let open = pos + offset;
        kept.push_str(&html[pos..open]);
        match boilerplate_at(&lower, open) {
            Some(tag) => pos = skip_element(&lower, open, tag),
            None => {
                kept.push('<');
                pos = open + 1;
            }
        }
    }
    kept.push_str(&html[pos..]);
    kept
}

/// The boilerplate tag opening at `open` (a `<` position), if any. The
/// byte after the name must end it, so `<nav>` matches but `<navigate>`
/// does not.
fn boilerplate_at(lower: &str, open: usize) -> Option<&'static str> {
    let rest = &lower[open + 1..];
    BOILERPLATE_TAGS.iter().copied().find(|tag| {
        rest.starts_with(tag)
            && matches!(
                rest.as_bytes().get(tag.len()),
                None | Some(b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>')
            )
    })
}

/// Position just past the element opening at `open`. An unclosed element
/// loses only its opening tag.
fn skip_element(lower: &str, open: usize, tag: &str) -> usize {
    let close = format!("</{tag}>");
    if let Some(offset) = lower[open..].find(&close) {
        return open + offset + close.len();
    }
    match lower[open..].find('>') {
        Some(offset) => open + offset + 1,
        None => lower.len(),
    }
}

/// Collapse runs of spaces within lines and blank-line runs between them,
/// keeping at most one blank line as a paragraph break.
fn tidy_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut paragraph_break = false;

    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            paragraph_break = !out.is_empty();
            continue;
        }
        if paragraph_break {
            out.push_str("\n\n");
            paragraph_break = false;
        } else if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&line);
    }
    out
}

fn clip_chars(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_owned();
    }
    let end = (0..=max)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    text[..end].to_owned()
}
