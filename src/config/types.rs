use crate::url::ClassificationMode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration structure for doc-scribe
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Builds a configuration with default settings for a single start URL
    pub fn for_url(start_url: &str) -> Self {
        Self {
            crawler: CrawlerConfig {
                start_url: start_url.to_string(),
                ..CrawlerConfig::default()
            },
            ..Self::default()
        }
    }

    /// All configured start URLs, primary first
    pub fn start_urls(&self) -> Vec<String> {
        std::iter::once(self.crawler.start_url.clone())
            .chain(self.crawler.extra_start_urls.iter().cloned())
            .collect()
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// The crawl root; its host and path prefix define "same site"
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Additional seeds enqueued alongside the start URL
    #[serde(rename = "extra-start-urls")]
    pub extra_start_urls: Vec<String>,

    /// Maximum link depth from the seeds
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Page cap; `None` means unlimited
    #[serde(rename = "max-pages")]
    pub max_pages: Option<usize>,

    /// Maximum number of fetches in flight
    pub concurrency: usize,

    /// Delay between batches (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    pub retries: u32,

    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    #[serde(rename = "backoff-max-ms")]
    pub backoff_max_ms: u64,

    /// Minimum backoff step after an HTTP 429
    #[serde(rename = "rate-limit-backoff-ms")]
    pub rate_limit_backoff_ms: u64,

    pub jitter: bool,

    /// Download images, stylesheets, scripts and fonts referenced by pages
    #[serde(rename = "include-assets")]
    pub include_assets: bool,

    /// Ask before crawling auxiliary pages
    pub interactive: bool,

    pub classification: ClassificationMode,

    #[serde(rename = "fetch-backend")]
    pub fetch_backend: FetchBackendKind,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            extra_start_urls: Vec::new(),
            max_depth: 5,
            max_pages: None,
            concurrency: 5,
            delay_ms: 500,
            timeout_secs: 30,
            retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 10_000,
            rate_limit_backoff_ms: 5_000,
            jitter: true,
            include_assets: false,
            interactive: false,
            classification: ClassificationMode::Permissive,
            fetch_backend: FetchBackendKind::Http,
        }
    }
}

/// Which page fetcher implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackendKind {
    #[default]
    Http,
    Browser,
}

/// URL and content allow/deny patterns (case-insensitive regular expressions)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    #[serde(rename = "url-include")]
    pub url_include: Vec<String>,

    #[serde(rename = "url-exclude")]
    pub url_exclude: Vec<String>,

    #[serde(rename = "content-include")]
    pub content_include: Vec<String>,

    #[serde(rename = "content-exclude")]
    pub content_exclude: Vec<String>,
}

/// HTTP client identification
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Extra request headers sent with every fetch
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("doc-scribe/{}", env!("CARGO_PKG_VERSION")),
            headers: BTreeMap::new(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for converted documents
    pub directory: PathBuf,

    pub format: OutputFormat,

    /// SQLite manifest; relative paths resolve inside `directory`
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,

    /// Write `_index.md` after the crawl
    #[serde(rename = "write-index")]
    pub write_index: bool,

    /// Write `_metadata/<page>.json` next to each document
    #[serde(rename = "write-metadata")]
    pub write_metadata: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./scribe-output"),
            format: OutputFormat::Markdown,
            database_path: PathBuf::from("scribe.db"),
            write_index: true,
            write_metadata: true,
        }
    }
}

impl OutputConfig {
    /// Resolves the manifest path against the output directory
    pub fn resolved_database_path(&self) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            self.directory.join(&self.database_path)
        }
    }
}

/// Target representation for converted pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}
