//! Edits applied to the parsed HTML tree
//!
//! Both helpers change nodes in place and serialize the tree again, so the
//! result does not depend on how the source markup was spelled.

use scraper::{Html, Node, Selector};
use std::borrow::Cow;

/// Removes every element matching one of `selectors`, subtree included
pub fn strip_elements(html: &str, selectors: &[&str]) -> String {
    let mut document = Html::parse_document(html);

    let mut doomed = Vec::new();
    for selector in selectors.iter().filter_map(|s| Selector::parse(s).ok()) {
        doomed.extend(document.select(&selector).map(|element| element.id()));
    }

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    document.html()
}

/// Replaces `attr` on every `tag` element for which `rewrite` returns a value
///
/// The input comes back untouched when nothing was rewritten.
pub fn rewrite_attribute<'a>(
    html: &'a str,
    tag: &str,
    attr: &str,
    rewrite: impl Fn(&str) -> Option<String>,
) -> Cow<'a, str> {
    let Ok(selector) = Selector::parse(&format!("{}[{}]", tag, attr)) else {
        return Cow::Borrowed(html);
    };

    let mut document = Html::parse_document(html);
    let replacements: Vec<_> = document
        .select(&selector)
        .filter_map(|element| {
            let value = element.value().attr(attr)?;
            rewrite(value).map(|replacement| (element.id(), replacement))
        })
        .collect();

    if replacements.is_empty() {
        return Cow::Borrowed(html);
    }

    for (id, replacement) in replacements {
        let Some(mut node) = document.tree.get_mut(id) else {
            continue;
        };
        if let Node::Element(element) = node.value() {
            for (name, value) in element.attrs.iter_mut() {
                if &*name.local == attr {
                    *value = replacement.as_str().into();
                }
            }
        }
    }

    Cow::Owned(document.html())
}
