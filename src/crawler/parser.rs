//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from <a> tags and canonical links)
//! - Asset references (images, scripts, stylesheets, media sources)
//! - Page title

use crate::url::normalize;
use scraper::{Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (<title>, falling back to the first <h1>)
    pub title: Option<String>,

    /// Normalized absolute page links, in document order, without duplicates
    pub links: Vec<String>,

    /// Normalized absolute asset URLs, in document order, without duplicates
    pub assets: Vec<String>,
}

/// Parses HTML content and extracts links, assets and the title
///
/// # Link Extraction Rules
///
/// **Links:**
/// - `<a href="...">` without a `download` attribute
/// - `<link rel="canonical" href="...">`
///
/// **Assets:**
/// - `<img src>`, `<script src>`, `<source src>`
/// - `<link rel="stylesheet" href>`, `<link rel="icon" href>`
///
/// `javascript:`, `mailto:`, `tel:`, data URIs and fragment-only links are
/// dropped during normalization.
///
/// # Example
///
/// ```
/// use doc_scribe::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
        assets: extract_assets(&document, base_url),
    }
}

/// Title of an HTML document, if it has one
pub fn page_title(html: &str) -> Option<String> {
    extract_title(&Html::parse_document(html))
}

fn extract_title(document: &Html) -> Option<String> {
    first_text(document, "title").or_else(|| first_text(document, "h1"))
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push_normalized(&mut links, href, base_url);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push_normalized(&mut links, href, base_url);
            }
        }
    }

    links
}

fn extract_assets(document: &Html, base_url: &Url) -> Vec<String> {
    let mut assets = Vec::new();

    let sources = [
        ("img[src]", "src"),
        ("script[src]", "src"),
        ("source[src]", "src"),
        ("link[rel~='stylesheet'][href]", "href"),
        ("link[rel~='icon'][href]", "href"),
    ];

    for (selector, attr) in sources {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attr) {
                push_normalized(&mut assets, value, base_url);
            }
        }
    }

    assets
}

fn push_normalized(out: &mut Vec<String>, href: &str, base_url: &Url) {
    if let Some(url) = normalize(href, base_url) {
        let url = url.to_string();
        if !out.contains(&url) {
            out.push(url);
        }
    }
}
