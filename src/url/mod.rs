//! URL handling module for doc-scribe
//!
//! This module provides URL normalization, domain extraction and link
//! classification. Everything here is a pure function of its inputs.

mod domain;
mod normalize;
pub mod patterns;

use serde::Deserialize;
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, has_doc_subdomain, registrable_domain};
pub use normalize::{normalize, normalize_url};

/// Purpose of a discovered link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkCategory {
    /// Documentation page on the crawled site
    Documentation,
    /// Same-site page that is not documentation (pricing, blog, account, ...)
    Auxiliary,
    /// Page on another site
    External,
    /// Image, stylesheet, script, font or archive
    Asset,
    /// Could not be normalized
    Invalid,
}

impl LinkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Documentation => "documentation",
            Self::Auxiliary => "auxiliary",
            Self::External => "external",
            Self::Asset => "asset",
            Self::Invalid => "invalid",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "documentation" => Some(Self::Documentation),
            "auxiliary" => Some(Self::Auxiliary),
            "external" => Some(Self::External),
            "asset" => Some(Self::Asset),
            "invalid" => Some(Self::Invalid),
            _ => None,
        }
    }
}

/// How strictly same-site links are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMode {
    /// Unmatched same-site links default to Auxiliary
    #[default]
    Permissive,
    /// Same-site links outside the documentation tree are Invalid
    Strict,
}

/// The crawl root against which links are classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRoot {
    host: String,
    registrable: String,
    prefix: Vec<String>,
}

impl SiteRoot {
    /// Builds a site root from a normalized start URL
    ///
    /// The path prefix is the root's path segments, minus a trailing
    /// file-like segment (`/guide/index.html` has prefix `["guide"]`).
    pub fn new(root: &Url) -> Self {
        let host = extract_domain(root).unwrap_or_default();
        let registrable = registrable_domain(&host);

        let mut prefix: Vec<String> = root
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_lowercase())
                    .collect()
            })
            .unwrap_or_default();
        if prefix.last().map_or(false, |last| last.contains('.')) {
            prefix.pop();
        }

        Self {
            host,
            registrable,
            prefix,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path segments every documentation page under this root shares
    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    fn continues_prefix(&self, segments: &[String]) -> bool {
        !self.prefix.is_empty() && segments.starts_with(&self.prefix)
    }
}

/// Classifies a normalized URL against the crawl root
///
/// This function checks the URL in the following priority order:
/// 1. Asset extension or asset directory
/// 2. Host mismatch: Documentation if a sibling host under the same
///    registrable domain carries a documentation subdomain label, else External
/// 3. Documentation path markers (`/docs/`, `/guide/`, `/reference/`, ...)
/// 4. Continuation of the root's own path prefix
/// 5. Auxiliary path markers (`/pricing/`, `/blog/`, `/legal/`, ...)
/// 6. Document-like extension (`.html`, `.md`, ...)
/// 7. Auxiliary (default)
///
/// In [`ClassificationMode::Strict`], same-site Documentation or Auxiliary
/// results outside the documentation tree are downgraded to Invalid.
///
/// # Examples
///
/// ```
/// use doc_scribe::url::{classify, normalize_url, ClassificationMode, LinkCategory, SiteRoot};
///
/// let root = SiteRoot::new(&normalize_url("https://docs.example.com").unwrap());
/// let page = normalize_url("https://docs.example.com/docs/intro").unwrap();
/// assert_eq!(
///     classify(&page, &root, ClassificationMode::Permissive),
///     LinkCategory::Documentation
/// );
/// ```
pub fn classify(url: &Url, root: &SiteRoot, mode: ClassificationMode) -> LinkCategory {
    let category = classify_permissive(url, root);
    match mode {
        ClassificationMode::Permissive => category,
        ClassificationMode::Strict => apply_strict(url, root, category),
    }
}

/// Normalizes `href` against `base` and classifies it in one step
///
/// Links that fail normalization are [`LinkCategory::Invalid`] with no URL.
pub fn classify_href(
    href: &str,
    base: &Url,
    root: &SiteRoot,
    mode: ClassificationMode,
) -> (Option<Url>, LinkCategory) {
    match normalize(href, base) {
        Some(url) => {
            let category = classify(&url, root, mode);
            (Some(url), category)
        }
        None => (None, LinkCategory::Invalid),
    }
}

fn classify_permissive(url: &Url, root: &SiteRoot) -> LinkCategory {
    let Some(host) = extract_domain(url) else {
        return LinkCategory::Invalid;
    };

    if patterns::is_asset_url(url) {
        return LinkCategory::Asset;
    }

    if host != root.host {
        if registrable_domain(&host) == root.registrable && has_doc_subdomain(&host) {
            return LinkCategory::Documentation;
        }
        return LinkCategory::External;
    }

    let path = patterns::marker_path(url);
    if patterns::has_doc_marker(&path) {
        return LinkCategory::Documentation;
    }

    if root.continues_prefix(&lowercase_segments(url)) {
        return LinkCategory::Documentation;
    }

    if patterns::has_aux_marker(&path) {
        return LinkCategory::Auxiliary;
    }

    if patterns::has_document_extension(url) {
        return LinkCategory::Documentation;
    }

    LinkCategory::Auxiliary
}

fn apply_strict(url: &Url, root: &SiteRoot, category: LinkCategory) -> LinkCategory {
    if !matches!(
        category,
        LinkCategory::Documentation | LinkCategory::Auxiliary
    ) {
        return category;
    }

    let path = patterns::marker_path(url);
    if patterns::STRICT_EXCLUDED.iter().any(|p| path.contains(p)) {
        return LinkCategory::Invalid;
    }

    if let Some(root_first) = root.prefix.first() {
        let segments = lowercase_segments(url);
        let shares_first = segments.first() == Some(root_first);
        let has_doc_prefix = segments
            .iter()
            .any(|s| patterns::STRICT_DOC_PREFIXES.contains(&s.as_str()));
        if !shares_first && !has_doc_prefix {
            return LinkCategory::Invalid;
        }
    }

    category
}

fn lowercase_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}
