//! Page fetcher capability and its HTTP implementation
//!
//! This module handles:
//! - The `PageFetcher` trait the crawl engine depends on
//! - Building HTTP clients with the configured user agent and headers
//! - Error classification (terminal vs. retryable)
//! - Selecting the fetch backend at construction time

use crate::config::{Config, FetchBackendKind, HttpConfig};
use crate::crawler::parser::parse_html;
use crate::ScribeError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors a page or asset fetch can end with
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("404 Not Found")]
    NotFound,

    #[error("429 Too Many Requests")]
    RateLimited,

    #[error("HTTP {0}")]
    Status(u16),

    #[error("timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if another attempt may succeed
    ///
    /// | Error | Retry |
    /// |-------|-------|
    /// | 404 | never |
    /// | malformed response | never |
    /// | cancelled | never |
    /// | 429, other HTTP status, timeout, network, browser | up to the retry limit |
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::Status(_)
                | Self::Timeout
                | Self::Network(_)
                | Self::Browser(_)
        )
    }

    /// Maps a non-success HTTP status to an error
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            other => Self::Status(other.as_u16()),
        }
    }

    /// Maps a status code reported by a non-HTTP backend
    ///
    /// Returns `None` for success and redirect codes.
    pub fn from_code(code: i64) -> Option<Self> {
        let status = u16::try_from(code)
            .ok()
            .and_then(|c| StatusCode::from_u16(c).ok());
        match status {
            Some(status) if status.is_success() || status.is_redirection() => None,
            Some(status) => Some(Self::from_status(status)),
            None => Some(Self::Malformed(format!("invalid status code {}", code))),
        }
    }

    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Network(format!("connection failed: {}", e))
        } else if e.is_decode() || e.is_body() {
            Self::Network(format!("body read failed: {}", e))
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// A fetched page: raw markup plus extracted, normalized link candidates
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,

    pub status_code: u16,

    pub content_type: Option<String>,

    /// Raw page markup (or text for non-HTML responses)
    pub content: String,

    pub title: Option<String>,

    /// Normalized, unclassified page links
    pub links: Vec<String>,

    /// Normalized asset references
    pub assets: Vec<String>,
}

/// The capability the crawl engine uses to retrieve pages
///
/// Implementations must extract links themselves, since only they know
/// whether the content was rendered.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches a page, bounded by `timeout`
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError>;

    /// Downloads raw bytes of an asset, bounded by `timeout`
    async fn fetch_asset(&self, url: &Url, timeout: Duration) -> Result<Vec<u8>, FetchError>;

    /// Releases backend resources; called once when the crawl finishes
    async fn shutdown(&self) {}

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Builds an HTTP client with the configured identity
///
/// # Arguments
///
/// * `config` - The HTTP configuration (user agent and extra headers)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use doc_scribe::config::HttpConfig;
/// use doc_scribe::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid header '{}'", name),
        }
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP page fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &Url, timeout: Duration) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status));
        }

        Ok(response)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let response = self.get(url, timeout).await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let content = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let is_html = content_type
            .as_deref()
            .map_or(true, |ct| ct.contains("html"));

        let parsed = if is_html {
            parse_html(&content, &final_url)
        } else {
            Default::default()
        };

        Ok(FetchedPage {
            final_url,
            status_code,
            content_type,
            content,
            title: parsed.title,
            links: parsed.links,
            assets: parsed.assets,
        })
    }

    async fn fetch_asset(&self, url: &Url, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url, timeout).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Constructs the fetch backend named in the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn PageFetcher>)` - The HTTP or browser fetcher
/// * `Err(ScribeError)` - Client construction or browser launch failed, or the
///   browser backend was requested without the `browser` feature
pub async fn build_fetcher(config: &Config) -> Result<Arc<dyn PageFetcher>, ScribeError> {
    match config.crawler.fetch_backend {
        FetchBackendKind::Http => Ok(Arc::new(HttpFetcher::new(&config.http)?)),
        #[cfg(feature = "browser")]
        FetchBackendKind::Browser => {
            let fetcher = crate::crawler::browser::BrowserFetcher::launch(&config.http).await?;
            Ok(Arc::new(fetcher))
        }
        #[cfg(not(feature = "browser"))]
        FetchBackendKind::Browser => Err(crate::ConfigError::Validation(
            "browser backend not compiled in (enable the `browser` feature)".to_string(),
        )
        .into()),
    }
}
