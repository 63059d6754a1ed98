//! Normalization of raw piped documents.
//!
//! Piped input that looks like an HTML document is reduced to the text a browser would
//! show in its body.  Anything else passes through untouched.  Whitespace compaction is
//! a separate step used before summarization.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Node, Selector};

use crate::error::{Error, Result};

/// Opening `<html ...>` tag followed anywhere later by a closing `</html>` tag.
static HTML_DOCUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*html(?:\s[^>]*)?>.*<\s*/\s*html\s*>")
        .expect("static HTML pattern is valid")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static whitespace pattern is valid"));

/// Elements whose text is never rendered.
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Returns true if `text` looks like a complete HTML document.
pub fn is_html_document(text: &str) -> bool {
    HTML_DOCUMENT.is_match(text)
}

/// Extracts visible body text when `raw` is an HTML document, otherwise returns it as-is.
///
/// # Errors
///
/// Returns a pretreatment error if `raw` is not UTF-8.
pub fn pretreat(raw: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(raw)
        .map_err(|err| Error::pretreatment(format!("input is not valid UTF-8: {err}")))?;
    if is_html_document(text) {
        visible_text(text)
    } else {
        Ok(text.to_string())
    }
}

/// Runs both stages: markup extraction, then whitespace compaction.
pub fn normalize(raw: &[u8]) -> Result<String> {
    Ok(compact_whitespace(&pretreat(raw)?))
}

/// Collapses every run of whitespace into one space and trims both ends.
pub fn compact_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

/// Concatenates the text nodes under `<body>`, skipping scripts, styles and templates.
///
/// Markup that matched the coarse document pattern but is not well formed is recovered
/// by the HTML5 parsing algorithm rather than rejected.
pub fn visible_text(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let body = Selector::parse("body")
        .map_err(|err| Error::pretreatment(format!("invalid body selector: {err:?}")))?;
    let mut text = String::new();
    for element in document.select(&body) {
        for node in element.descendants() {
            let Node::Text(fragment) = node.value() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
                Node::Element(parent) => INVISIBLE_ELEMENTS.contains(&parent.name()),
                _ => false,
            });
            if !hidden {
                text.push_str(fragment);
            }
        }
    }
    Ok(text)
}
