use url::Url;

/// Subdomain labels that mark a sibling host as part of the same documentation site
const DOC_SUBDOMAIN_LABELS: &[&str] = &[
    "docs",
    "documentation",
    "developer",
    "developers",
    "api",
    "guide",
    "help",
    "support",
    "manual",
    "learn",
];

/// Extracts the lowercase host from a URL, without a leading `www.`
///
/// # Examples
///
/// ```
/// use url::Url;
/// use doc_scribe::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let host = h.to_lowercase();
        match host.strip_prefix("www.") {
            Some(rest) => rest.to_string(),
            None => host,
        }
    })
}

/// Returns the registrable part of a host: its last two labels
///
/// This is a heuristic, not a public-suffix lookup; `docs.example.co.uk`
/// yields `co.uk`. IP addresses and single-label hosts are returned as-is.
pub fn registrable_domain(host: &str) -> String {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return host.to_string();
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }
    labels[labels.len() - 2..].join(".")
}

/// Checks whether any subdomain label of `host` names a documentation site
///
/// Only labels left of the registrable domain are inspected, so
/// `docs.example.com` and `api.v2.example.com` qualify but `example.com` does not.
pub fn has_doc_subdomain(host: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return false;
    }

    labels[..labels.len() - 2]
        .iter()
        .any(|label| DOC_SUBDOMAIN_LABELS.contains(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_strips_www() {
        let url = Url::parse("https://www.example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("docs.example.com"), "example.com");
        assert_eq!(registrable_domain("a.b.example.com"), "example.com");
        assert_eq!(registrable_domain("example.com"), "example.com");
        assert_eq!(registrable_domain("localhost"), "localhost");
        assert_eq!(registrable_domain("127.0.0.1"), "127.0.0.1");
    }

    #[test]
    fn test_doc_subdomain() {
        assert!(has_doc_subdomain("docs.example.com"));
        assert!(has_doc_subdomain("developer.example.com"));
        assert!(has_doc_subdomain("api.v2.example.com"));

        assert!(!has_doc_subdomain("blog.example.com"));
        assert!(!has_doc_subdomain("example.com"));
        assert!(!has_doc_subdomain("docs.com"));
    }
}
