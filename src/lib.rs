//! doc-scribe: a documentation site crawler
//!
//! This crate crawls a documentation website breadth-first, classifies every
//! discovered link by purpose, fetches pages concurrently with retry and
//! backoff, and hands accepted pages to a formatter and persistence layer.

pub mod config;
pub mod crawler;
pub mod filter;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for doc-scribe operations
#[derive(Debug, Error)]
pub enum ScribeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Fetch backend error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid filter pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for doc-scribe operations
pub type Result<T> = std::result::Result<T, ScribeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, run_crawl_with_fetcher, Coordinator, CrawlEvent, CrawlReport};
pub use filter::FilterSet;
pub use state::{CrawlPhase, Frontier, FrontierEntry};
pub use url::{classify, normalize, normalize_url, ClassificationMode, LinkCategory, SiteRoot};
