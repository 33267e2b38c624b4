//! Content formatters for the four output formats
//!
//! - `markdown`: htmd conversion, titled with a level-one heading
//! - `html`: the page markup with scripts and styles removed
//! - `text`: visible text, whitespace-normalized
//! - `json`: url, title, headings and text content

use crate::config::OutputFormat;
use crate::crawler::page_title;
use crate::output::markup::strip_elements;
use crate::output::traits::{ContentFormatter, FormatError, FormattedContent};
use scraper::{Html, Node, Selector};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// Elements never carried into any output format
const STRIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "iframe"];

/// Builds the formatter for a configured output format
pub fn build_formatter(format: OutputFormat) -> Arc<dyn ContentFormatter> {
    match format {
        OutputFormat::Markdown => Arc::new(MarkdownFormatter),
        OutputFormat::Html => Arc::new(HtmlFormatter),
        OutputFormat::Text => Arc::new(TextFormatter),
        OutputFormat::Json => Arc::new(JsonFormatter),
    }
}

/// Inner markup of `<body>`, or the whole input when there is none
fn body_html(html: &str) -> String {
    let document = Html::parse_document(html);
    Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next().map(|b| b.inner_html()))
        .unwrap_or_else(|| html.to_string())
}

/// Visible text of a document, one line per text node
fn visible_text(document: &Html) -> String {
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| STRIPPED_ELEMENTS.contains(&el.name()) || el.name() == "head")
        });
        if hidden {
            continue;
        }

        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines.join("\n")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFormatter;

impl ContentFormatter for MarkdownFormatter {
    fn convert(&self, raw: &str, _url: &Url) -> Result<FormattedContent, FormatError> {
        let cleaned = body_html(&strip_elements(raw, STRIPPED_ELEMENTS));
        let markdown = match htmd::convert(&cleaned) {
            Ok(markdown) => markdown,
            Err(e) => {
                tracing::debug!("htmd conversion failed, falling back to text: {}", e);
                visible_text(&Html::parse_document(&cleaned))
            }
        };
        let markdown = markdown.trim();
        if markdown.is_empty() {
            return Err(FormatError::Empty);
        }

        let body = match page_title(raw) {
            Some(title) if !markdown.starts_with('#') => {
                format!("# {}\n\n{}\n", title, markdown)
            }
            _ => format!("{}\n", markdown),
        };

        Ok(FormattedContent {
            body,
            extension: self.extension(),
        })
    }

    fn name(&self) -> &'static str {
        OutputFormat::Markdown.as_str()
    }

    fn extension(&self) -> &'static str {
        "md"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFormatter;

impl ContentFormatter for HtmlFormatter {
    fn convert(&self, raw: &str, _url: &Url) -> Result<FormattedContent, FormatError> {
        if raw.trim().is_empty() {
            return Err(FormatError::Empty);
        }
        Ok(FormattedContent {
            body: strip_elements(raw, STRIPPED_ELEMENTS),
            extension: self.extension(),
        })
    }

    fn name(&self) -> &'static str {
        OutputFormat::Html.as_str()
    }

    fn extension(&self) -> &'static str {
        "html"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl ContentFormatter for TextFormatter {
    fn convert(&self, raw: &str, _url: &Url) -> Result<FormattedContent, FormatError> {
        let text = visible_text(&Html::parse_document(raw));
        if text.is_empty() {
            return Err(FormatError::Empty);
        }
        Ok(FormattedContent {
            body: format!("{}\n", text),
            extension: self.extension(),
        })
    }

    fn name(&self) -> &'static str {
        OutputFormat::Text.as_str()
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}

#[derive(Debug, Serialize)]
struct JsonDocument<'a> {
    url: &'a str,
    title: Option<String>,
    headings: Vec<String>,
    content: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl ContentFormatter for JsonFormatter {
    fn convert(&self, raw: &str, url: &Url) -> Result<FormattedContent, FormatError> {
        let document = Html::parse_document(raw);

        let headings = match Selector::parse("h1, h2, h3, h4, h5, h6") {
            Ok(selector) => document
                .select(&selector)
                .map(|h| h.text().collect::<Vec<_>>().join(" "))
                .map(|h| h.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|h| !h.is_empty())
                .collect(),
            Err(_) => Vec::new(),
        };

        let doc = JsonDocument {
            url: url.as_str(),
            title: page_title(raw),
            headings,
            content: visible_text(&document),
        };

        let body = serde_json::to_string_pretty(&doc)
            .map_err(|e| FormatError::Conversion(e.to_string()))?;

        Ok(FormattedContent {
            body,
            extension: self.extension(),
        })
    }

    fn name(&self) -> &'static str {
        OutputFormat::Json.as_str()
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
