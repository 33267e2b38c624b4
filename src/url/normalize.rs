use crate::UrlError;
use url::Url;

/// Query parameters that select page content and survive normalization.
/// Everything else (utm_*, gclid, fbclid, session ids, ...) is dropped.
const KEPT_QUERY_PARAMS: &[&str] = &["lang", "version", "v", "platform"];

/// Link prefixes that never point at a fetchable page
const SKIPPED_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Normalizes an absolute URL according to doc-scribe's canonical form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an `http` or `https` scheme and a host
/// 3. Remove the fragment
/// 4. Keep only allow-listed query parameters (`lang`, `version`, `v`, `platform`)
/// 5. Collapse repeated `/` in the path
/// 6. Remove the trailing slash (except for the root `/`)
///
/// Host lowercasing and dot-segment removal are performed by the parser.
///
/// # Examples
///
/// ```
/// use doc_scribe::url::normalize_url;
///
/// let url = normalize_url("https://Docs.Example.com//guide/?utm_source=x&lang=en#top").unwrap();
/// assert_eq!(url.as_str(), "https://docs.example.com/guide?lang=en");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(url)
}

/// Resolves `href` against `base` and normalizes the result
///
/// Returns `None` for anything that cannot become a crawlable URL:
/// fragment-only links, `javascript:`/`mailto:`/`tel:`/`data:` links,
/// unparseable input and non-HTTP schemes. Never fails loudly.
///
/// # Examples
///
/// ```
/// use doc_scribe::url::normalize;
/// use url::Url;
///
/// let base = Url::parse("https://x.com/docs/").unwrap();
/// let url = normalize("../p?utm_source=a&lang=en", &base).unwrap();
/// assert_eq!(url.as_str(), "https://x.com/p?lang=en");
/// assert!(normalize("javascript:void(0)", &base).is_none());
/// ```
pub fn normalize(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if SKIPPED_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
        return None;
    }

    let joined = base.join(href).ok()?;
    canonicalize(joined).ok()
}

fn canonicalize(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    retain_query_params(&mut url);

    let path = collapse_path(url.path());
    url.set_path(&path);

    Ok(url)
}

/// Collapses repeated separators and drops the trailing slash
fn collapse_path(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut previous_slash = false;

    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(c);
    }

    if collapsed.is_empty() {
        return "/".to_string();
    }

    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }

    collapsed
}

fn retain_query_params(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| is_kept_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept.iter());
    }
}

fn is_kept_param(key: &str) -> bool {
    KEPT_QUERY_PARAMS
        .iter()
        .any(|kept| kept.eq_ignore_ascii_case(key))
}
