//! Comparable document trees
//!
//! Page bodies are parsed with `scraper` and reduced to the parts that carry
//! structure: elements, their stable attributes and their own text.

use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use thiserror::Error;

/// Elements whose content never contributes to a template
const DROPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Deepest element nesting accepted below the root
const MAX_DEPTH: usize = 512;

/// Errors raised when a body cannot be turned into a document tree
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unsupported content type: {0}")]
    UnsupportedMime(String),

    #[error("Body is JSON, not markup")]
    NotMarkup,

    #[error("Document is empty")]
    Empty,

    #[error("Elements nest deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// An element of a parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order
    pub children: Vec<Node>,
    /// The element's own text (not its descendants'), whitespace-collapsed
    pub text: Option<String>,
}

impl Node {
    /// Creates an element without attributes, children or text
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Returns the whitespace-collapsed text of this node and its descendants
    pub fn full_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, parts: &mut Vec<&'a str>) {
        if let Some(text) = &self.text {
            parts.push(text);
        }
        for child in &self.children {
            child.collect_text(parts);
        }
    }

    /// Counts this node and all of its descendants
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Node::size).sum::<usize>()
    }
}

/// A page reduced to its element tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub root: Node,
}

/// Parses a page body into a document tree
///
/// Comments, `script`, `style`, `noscript` and `template` elements are
/// dropped, as are the volatile `style`, `on*` and `data-*` attributes.
/// Documents nesting elements more than 512 levels deep are rejected, which
/// bounds the recursion of everything that walks the tree afterwards.
///
/// # Arguments
///
/// * `body` - The page body
/// * `mime` - The content type the page was served with
///
/// # Returns
///
/// * `Ok(ParsedDocument)` - The document tree
/// * `Err(ParseError)` - The body is not usable markup
pub fn parse_document(body: &str, mime: &str) -> Result<ParsedDocument, ParseError> {
    let mime = mime.trim().to_ascii_lowercase();
    if mime.contains("json") {
        return Err(ParseError::NotMarkup);
    }
    if !mime.is_empty() && !mime.contains("html") && !mime.contains("xml") {
        return Err(ParseError::UnsupportedMime(mime));
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return Err(ParseError::NotMarkup);
    }

    let html = Html::parse_document(body);
    let root = convert(html.root_element(), 0)?.ok_or(ParseError::Empty)?;
    Ok(ParsedDocument { root })
}

fn keep_attribute(name: &str) -> bool {
    name != "style" && !name.starts_with("on") && !name.starts_with("data-")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn convert(element: ElementRef<'_>, depth: usize) -> Result<Option<Node>, ParseError> {
    if depth > MAX_DEPTH {
        return Err(ParseError::TooDeep);
    }

    let tag = element.value().name().to_ascii_lowercase();
    if DROPPED_ELEMENTS.contains(&tag.as_str()) {
        return Ok(None);
    }

    let attributes = element
        .value()
        .attrs()
        .filter(|(name, _)| keep_attribute(name))
        .map(|(name, value)| (name.to_ascii_lowercase(), collapse_whitespace(value)))
        .collect();

    let mut children = Vec::new();
    let mut text = String::new();
    for child in element.children() {
        match child.value() {
            scraper::Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    if let Some(node) = convert(element, depth + 1)? {
                        children.push(node);
                    }
                }
            }
            scraper::Node::Text(t) => {
                text.push(' ');
                text.push_str(t);
            }
            _ => {}
        }
    }

    let text = collapse_whitespace(&text);
    Ok(Some(Node {
        tag,
        attributes,
        children,
        text: (!text.is_empty()).then_some(text),
    }))
}
