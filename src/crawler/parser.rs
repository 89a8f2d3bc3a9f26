//! Link extraction from fetched pages
//!
//! This module pulls the outbound links out of an HTML page and orders them
//! the way they are pushed to the frontier.

use scraper::{Html, Selector};
use url::Url;

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Absolute http(s) URL
    pub url: String,

    /// Visible text of the anchor, whitespace-collapsed
    pub anchor_text: String,
}

/// Extracts the outbound links of an HTML page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Anything that does not resolve to http or https
///
/// Links are returned shallowest path first, then alphabetically, with
/// duplicates removed.
///
/// # Example
///
/// ```
/// use stencil::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<body><a href="/b/c">Deep</a><a href="/a">Shallow</a></body>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let links = extract_links(html, &base);
/// assert_eq!(links[0].url, "https://example.com/a");
/// assert_eq!(links[1].anchor_text, "Deep");
/// ```
pub fn extract_links(html: &str, base_url: &Url) -> Vec<DiscoveredLink> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                let anchor_text = element
                    .text()
                    .flat_map(str::split_whitespace)
                    .collect::<Vec<_>>()
                    .join(" ");
                links.push(DiscoveredLink { url, anchor_text });
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                links.push(DiscoveredLink {
                    url,
                    anchor_text: String::new(),
                });
            }
        }
    }

    prioritize(&mut links);
    links
}

/// Orders links by path depth, then alphabetically, and drops repeats
fn prioritize(links: &mut Vec<DiscoveredLink>) {
    links.sort_by(|a, b| {
        let depth_a = a.url.matches('/').count();
        let depth_b = b.url.matches('/').count();
        depth_a.cmp(&depth_b).then_with(|| a.url.cmp(&b.url))
    });
    links.dedup_by(|later, earlier| later.url == earlier.url);
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/shop/page").unwrap()
    }

    fn urls(html: &str) -> Vec<String> {
        extract_links(html, &base_url())
            .into_iter()
            .map(|l| l.url)
            .collect()
    }

    #[test]
    fn test_relative_links_resolved() {
        let html = r#"<a href="/other">A</a><a href="item">B</a><a href="https://other.com/x">C</a>"#;
        assert_eq!(
            urls(html),
            vec![
                "https://example.com/other",
                "https://other.com/x",
                "https://example.com/shop/item",
            ]
        );
    }

    #[test]
    fn test_skipped_links() {
        let html = r##"
            <a href="javascript:void(0)">js</a>
            <a href="MAILTO:test@example.com">mail</a>
            <a href="tel:+1234567890">call</a>
            <a href="data:text/html,x">data</a>
            <a href="#section">jump</a>
            <a href="/file.pdf" download>file</a>
            <a href="ftp://example.com/f">ftp</a>
            <a href="">empty</a>
        "##;
        assert!(urls(html).is_empty());
    }

    #[test]
    fn test_anchor_text_collapsed() {
        let html = r#"<a href="/p">  Red
            <b>shoes</b> </a>"#;
        let links = extract_links(html, &base_url());
        assert_eq!(links[0].anchor_text, "Red shoes");
    }

    #[test]
    fn test_canonical_link_included() {
        let html = r#"<head><link rel="canonical" href="https://example.com/canonical"></head>"#;
        assert_eq!(urls(html), vec!["https://example.com/canonical"]);
    }

    #[test]
    fn test_ordering_and_dedupe() {
        let html = r#"
            <a href="/z/deep/page">1</a>
            <a href="/b">2</a>
            <a href="/a">3</a>
            <a href="/b">4</a>
            <a href="/a/child">5</a>
        "#;
        assert_eq!(
            urls(html),
            vec![
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/a/child",
                "https://example.com/z/deep/page",
            ]
        );
    }
}
