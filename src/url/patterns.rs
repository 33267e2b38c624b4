//! Path heuristics used by link classification

use url::Url;

/// Path markers of documentation pages, checked in order
pub const DOC_MARKERS: &[&str] = &[
    "/docs/",
    "/doc/",
    "/documentation/",
    "/guide/",
    "/guides/",
    "/reference/",
    "/api/",
    "/manual/",
    "/tutorial/",
    "/get-started/",
    "/learn/",
    "/howto/",
    "/usage/",
    "/examples/",
    "/quickstart/",
    "/sdk/",
    "/cli/",
    "/faq/",
    "/help/",
];

/// Path markers of same-site pages that are not documentation
pub const AUX_MARKERS: &[&str] = &[
    "/account/",
    "/profile/",
    "/settings/",
    "/user/",
    "/pricing/",
    "/billing/",
    "/subscription/",
    "/payment/",
    "/plans/",
    "/about/",
    "/company/",
    "/team/",
    "/contact/",
    "/support/",
    "/legal/",
    "/terms/",
    "/privacy/",
    "/blog/",
    "/news/",
];

const ASSET_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "css", "scss", "less", "js", "mjs",
    "woff", "woff2", "ttf", "eot", "otf", "pdf", "zip", "tar", "gz", "xml", "json", "mp4", "webm",
    "mp3",
];

const ASSET_DIRECTORIES: &[&str] = &[
    "/assets/", "/static/", "/images/", "/img/", "/css/", "/js/", "/fonts/",
];

const DOCUMENT_EXTENSIONS: &[&str] = &["html", "htm", "md", "txt"];

/// First path segments accepted by strict classification when the crawl root has a path
pub const STRICT_DOC_PREFIXES: &[&str] = &[
    "docs",
    "guide",
    "guides",
    "documentation",
    "help",
    "reference",
    "api",
    "get-started",
];

/// Paths strict classification never crawls
pub const STRICT_EXCLUDED: &[&str] = &[
    "/auth/", "/login/", "/logout/", "/signup/", "/admin/", "/account/", "/billing/", "/pricing/",
];

/// Lowercased path with a trailing `/`, so `/docs` matches the `/docs/` marker
pub fn marker_path(url: &Url) -> String {
    let mut path = url.path().to_lowercase();
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// Lowercased extension of the last path segment, if any
pub fn path_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.last()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Images, stylesheets, scripts, fonts, media and archives
pub fn is_asset_url(url: &Url) -> bool {
    if let Some(ext) = path_extension(url) {
        if ASSET_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
    }

    let path = marker_path(url);
    ASSET_DIRECTORIES.iter().any(|dir| path.contains(dir))
}

pub fn has_doc_marker(path: &str) -> bool {
    DOC_MARKERS.iter().any(|marker| path.contains(marker))
}

pub fn has_aux_marker(path: &str) -> bool {
    AUX_MARKERS.iter().any(|marker| path.contains(marker))
}

pub fn has_document_extension(url: &Url) -> bool {
    path_extension(url).map_or(false, |ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
}

/// Subdirectory under `assets/` for a downloaded asset
pub fn asset_subdirectory(url: &Url) -> &'static str {
    match path_extension(url).as_deref() {
        Some("jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" | "ico" | "bmp") => "images",
        Some("css" | "scss" | "less") => "css",
        Some("js" | "mjs") => "js",
        Some("woff" | "woff2" | "ttf" | "eot" | "otf") => "fonts",
        _ => "other",
    }
}
