//! Filesystem persistence for converted pages and assets
//!
//! Pages land at `<output>/<path>.<ext>`, mirroring the site's URL layout
//! below the crawl root. Assets land at `<output>/assets/<kind>/<file>`.
//! Every write is also recorded in the run manifest when one is attached.

use crate::output::markup::rewrite_attribute;
use crate::output::traits::{FormattedContent, OutputResult, PagePersistence};
use crate::storage::{SqliteStorage, Storage, StorageError};
use crate::url::patterns::{asset_subdirectory, has_document_extension};
use crate::url::{classify, extract_domain, normalize, ClassificationMode, LinkCategory, SiteRoot};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;

/// Slug segments are cut to this many characters
const MAX_SLUG_LEN: usize = 80;

/// Leading path segments dropped from page paths
const DOC_ROOT_SEGMENTS: &[&str] = &["docs", "documentation", "doc"];

pub const METADATA_DIR: &str = "_metadata";
pub const ASSETS_DIR: &str = "assets";

/// The run manifest a store records its writes into
#[derive(Clone)]
pub struct Manifest {
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub run_id: i64,
}

#[derive(Debug, Serialize)]
struct PageMetadata<'a> {
    url: &'a str,
    title: Option<&'a str>,
    date_downloaded: String,
    original_domain: Option<String>,
    path: &'a str,
    format: &'a str,
}

/// Writes pages and assets below an output directory
pub struct FileStore {
    directory: PathBuf,
    root: SiteRoot,
    format: &'static str,
    write_metadata: bool,
    /// Decides which links are rewritten to local files
    classification: ClassificationMode,
    manifest: Option<Manifest>,
    /// relative path -> URL that claimed it during this run
    claimed: Mutex<HashMap<PathBuf, String>>,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>, root: SiteRoot, format: &'static str) -> Self {
        Self {
            directory: directory.into(),
            root,
            format,
            write_metadata: false,
            classification: ClassificationMode::Permissive,
            manifest: None,
            claimed: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_metadata(mut self, enabled: bool) -> Self {
        self.write_metadata = enabled;
        self
    }

    /// Only links this mode classifies as documentation are made local
    pub fn with_classification(mut self, mode: ClassificationMode) -> Self {
        self.classification = mode;
        self
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Relative path (without extension) a page URL is stored under
    ///
    /// The crawl root's prefix and a leading `docs`-like segment are
    /// stripped, an empty remainder becomes `index`, and each segment is
    /// slugified. A kept query string is folded into the last segment.
    pub fn path_for_url(&self, url: &Url) -> PathBuf {
        let mut segments: Vec<String> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        let same_host = extract_domain(url).as_deref() == Some(self.root.host());
        if same_host {
            let prefix = self.root.prefix();
            let lowered: Vec<String> = segments.iter().map(|s| s.to_lowercase()).collect();
            if !prefix.is_empty() && lowered.starts_with(prefix) {
                segments.drain(..prefix.len());
            }
        }

        if segments
            .first()
            .map_or(false, |s| DOC_ROOT_SEGMENTS.contains(&s.to_lowercase().as_str()))
        {
            segments.remove(0);
        }

        if let Some(last) = segments.last_mut() {
            if has_document_extension(url) {
                if let Some((stem, _)) = last.rsplit_once('.') {
                    *last = stem.to_string();
                }
            }
        }

        let mut slugs: Vec<String> = segments
            .iter()
            .map(|s| slugify(s))
            .filter(|s| !s.is_empty())
            .collect();

        if slugs.is_empty() {
            slugs.push("index".to_string());
        }

        if let Some(query) = url.query().filter(|q| !q.is_empty()) {
            if let Some(last) = slugs.last_mut() {
                let suffix = slugify(query);
                if !suffix.is_empty() {
                    *last = truncate(&format!("{}-{}", last, suffix));
                }
            }
        }

        if !same_host {
            if let Some(host) = extract_domain(url) {
                slugs.insert(0, slugify(&host));
            }
        }

        slugs.iter().collect()
    }

    /// Relative path an asset URL is stored under
    pub fn asset_path_for_url(&self, url: &Url) -> PathBuf {
        let file_name = url
            .path_segments()
            .and_then(|mut s| s.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "asset".to_string());

        let file_name = match file_name.rsplit_once('.') {
            Some((stem, ext)) => format!("{}.{}", slugify(stem), slugify(ext)),
            None => slugify(&file_name),
        };

        Path::new(ASSETS_DIR)
            .join(asset_subdirectory(url))
            .join(file_name)
    }

    /// Reserves `relative` for `url`, or a hashed variant if another URL holds it
    fn claim(&self, relative: PathBuf, url: &Url) -> PathBuf {
        let Ok(mut claimed) = self.claimed.lock() else {
            return relative;
        };

        match claimed.get(&relative) {
            Some(owner) if owner != url.as_str() => {
                let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
                let stem = relative
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let mut name = format!("{}-{}", stem, &digest[..8]);
                if let Some(ext) = relative.extension() {
                    name.push('.');
                    name.push_str(&ext.to_string_lossy());
                }
                let alternative = relative.with_file_name(name);
                claimed.insert(alternative.clone(), url.to_string());
                alternative
            }
            _ => {
                claimed.insert(relative.clone(), url.to_string());
                relative
            }
        }
    }

    fn write(&self, relative: &Path, bytes: &[u8]) -> OutputResult<PathBuf> {
        let full = self.directory.join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, bytes)?;
        Ok(full)
    }

    fn write_metadata_file(
        &self,
        url: &Url,
        title: Option<&str>,
        relative: &Path,
    ) -> OutputResult<()> {
        let path = to_manifest_path(relative);
        let metadata = PageMetadata {
            url: url.as_str(),
            title,
            date_downloaded: Utc::now().to_rfc3339(),
            original_domain: extract_domain(url),
            path: &path,
            format: self.format,
        };

        let stem = relative.with_extension("");
        let slug = to_manifest_path(&stem).replace('/', "__");
        let json = serde_json::to_string_pretty(&metadata)?;
        self.write(
            &Path::new(METADATA_DIR).join(format!("{}.json", slug)),
            json.as_bytes(),
        )?;
        Ok(())
    }

    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage, i64) -> Result<T, StorageError>,
    ) -> OutputResult<Option<T>> {
        let Some(manifest) = &self.manifest else {
            return Ok(None);
        };
        let mut storage = manifest
            .storage
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(Some(f(&mut storage, manifest.run_id)?))
    }
}

impl PagePersistence for FileStore {
    fn save(
        &self,
        url: &Url,
        title: Option<&str>,
        content: &FormattedContent,
    ) -> OutputResult<PathBuf> {
        let relative = self.claim(
            self.path_for_url(url).with_extension(content.extension),
            url,
        );
        let full = self.write(&relative, content.body.as_bytes())?;
        tracing::debug!("Saved {} -> {}", url, full.display());

        if self.write_metadata {
            self.write_metadata_file(url, title, &relative)?;
        }

        let path = to_manifest_path(&relative);
        self.with_storage(|storage, run_id| {
            storage.record_document(run_id, url.as_str(), title, &path, self.format)
        })?;

        Ok(full)
    }

    fn save_asset(&self, url: &Url, bytes: &[u8]) -> OutputResult<PathBuf> {
        let relative = self.claim(self.asset_path_for_url(url), url);
        let full = self.write(&relative, bytes)?;
        tracing::debug!("Saved asset {} -> {}", url, full.display());

        let path = to_manifest_path(&relative);
        self.with_storage(|storage, run_id| {
            storage.record_asset(run_id, url.as_str(), &path, bytes.len() as u64)
        })?;

        Ok(full)
    }

    fn localize_links<'a>(&self, html: &'a str, page: &Url, extension: &str) -> Cow<'a, str> {
        let from = self.path_for_url(page).with_extension(extension);

        rewrite_attribute(html, "a", "href", |href| {
            let target = normalize(href, page)?;
            if classify(&target, &self.root, self.classification) != LinkCategory::Documentation {
                return None;
            }

            let to = self.path_for_url(&target).with_extension(extension);
            let mut local = relative_link(&from, &to);
            if let Some(fragment) = page.join(href).ok().and_then(|u| u.fragment().map(str::to_string)) {
                local.push('#');
                local.push_str(&fragment);
            }
            Some(local)
        })
    }
}

/// `/`-separated path from the directory holding `from` to `to`
fn relative_link(from: &Path, to: &Path) -> String {
    let base: Vec<_> = from
        .parent()
        .map(|parent| parent.components().collect())
        .unwrap_or_default();
    let target: Vec<_> = to.components().collect();

    let common = base
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts = vec!["..".to_string(); base.len() - common];
    parts.extend(
        target[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

/// `/`-separated form of a relative path
fn to_manifest_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Lowercase ASCII alphanumerics, `-` and `_`; everything else becomes `-`
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    truncate(slug.trim_matches('-'))
}

fn truncate(slug: &str) -> String {
    slug.chars()
        .take(MAX_SLUG_LEN)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::normalize_url;

    fn store(dir: &Path, root: &str) -> FileStore {
        FileStore::new(dir, SiteRoot::new(&normalize_url(root).unwrap()), "markdown")
    }

    fn url(s: &str) -> Url {
        normalize_url(s).unwrap()
    }

    fn markdown(body: &str) -> FormattedContent {
        FormattedContent {
            body: body.to_string(),
            extension: "md",
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("API_v2"), "api_v2");
        assert_eq!(slugify("--a//b--"), "a-b");
        assert_eq!(slugify(&"x".repeat(200)).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_path_for_url() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), "https://docs.example.com/guide/");

        let cases = [
            ("https://docs.example.com/guide", "index"),
            ("https://docs.example.com/guide/install", "install"),
            ("https://docs.example.com/guide/cli/Flags.html", "cli/flags"),
            ("https://docs.example.com/docs/api/users", "api/users"),
            ("https://docs.example.com/guide/setup/index.html", "setup/index"),
            ("https://docs.example.com/guide/page?lang=en", "page-lang-en"),
            ("https://api.example.com/v1", "api-example-com/v1"),
        ];
        for (input, expected) in cases {
            assert_eq!(s.path_for_url(&url(input)), PathBuf::from(expected), "{}", input);
        }
    }

    #[test]
    fn test_localize_links_points_at_saved_files() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), "https://docs.example.com/guide/");
        let page = url("https://docs.example.com/guide/cli/flags");

        let html = r##"<body>
            <a href="/guide/install">Install</a>
            <a href="env#vars">Env</a>
            <a href="/guide/">Home</a>
            <a href="https://other.com/x">Other</a>
            <a href="/pricing">Pricing</a>
            <a href="#top">Top</a>
        </body>"##;
        let out = s.localize_links(html, &page, "md");

        assert!(out.contains(r#"href="../install.md""#), "{}", out);
        assert!(out.contains(r#"href="env.md#vars""#), "{}", out);
        assert!(out.contains(r#"href="../index.md""#), "{}", out);
        assert!(out.contains(r#"href="https://other.com/x""#));
        assert!(out.contains(r#"href="/pricing""#));
        assert!(out.contains(r##"href="#top""##));
    }

    #[test]
    fn test_relative_link() {
        assert_eq!(relative_link(Path::new("index.md"), Path::new("a/b.md")), "a/b.md");
        assert_eq!(relative_link(Path::new("a/b.md"), Path::new("a/c.md")), "c.md");
        assert_eq!(relative_link(Path::new("a/b/c.md"), Path::new("d.md")), "../../d.md");
    }

    #[test]
    fn test_asset_path() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), "https://docs.example.com/");

        assert_eq!(
            s.asset_path_for_url(&url("https://docs.example.com/img/Logo_Dark.PNG")),
            PathBuf::from("assets/images/logo_dark.png")
        );
        assert_eq!(
            s.asset_path_for_url(&url("https://docs.example.com/static/site.css")),
            PathBuf::from("assets/css/site.css")
        );
    }

    #[test]
    fn test_save_writes_document_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), "https://docs.example.com/").with_metadata(true);

        let page = url("https://docs.example.com/docs/intro");
        let path = s.save(&page, Some("Intro"), &markdown("# Intro\n")).unwrap();

        assert_eq!(path, dir.path().join("intro.md"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "# Intro\n");

        let meta: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("_metadata/intro.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(meta["url"], "https://docs.example.com/docs/intro");
        assert_eq!(meta["title"], "Intro");
        assert_eq!(meta["original_domain"], "docs.example.com");
        assert_eq!(meta["path"], "intro.md");
        assert_eq!(meta["format"], "markdown");
    }

    #[test]
    fn test_colliding_paths_get_hashed_names() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), "https://docs.example.com/");

        let first = s
            .save(&url("https://docs.example.com/docs/intro"), None, &markdown("a"))
            .unwrap();
        let second = s
            .save(&url("https://docs.example.com/intro"), None, &markdown("b"))
            .unwrap();
        let again = s
            .save(&url("https://docs.example.com/docs/intro"), None, &markdown("c"))
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(first, again);
        assert_eq!(fs::read_to_string(&first).unwrap(), "c");
        assert_eq!(fs::read_to_string(&second).unwrap(), "b");
    }

    #[test]
    fn test_manifest_records_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("https://docs.example.com/", "h").unwrap();
        let storage = Arc::new(Mutex::new(storage));

        let s = store(dir.path(), "https://docs.example.com/").with_manifest(Manifest {
            storage: Arc::clone(&storage),
            run_id,
        });
        s.save(&url("https://docs.example.com/docs/a"), Some("A"), &markdown("x"))
            .unwrap();
        s.save_asset(&url("https://docs.example.com/img/a.png"), b"PNG")
            .unwrap();

        let storage = storage.lock().unwrap();
        let docs = storage.list_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "a.md");
        assert_eq!(storage.count_assets(run_id).unwrap(), 1);
        assert!(dir.path().join("assets/images/a.png").exists());
    }
}
