//! Output collaborator traits and error types
//!
//! The crawl engine depends only on these two traits. It converts fetched
//! markup with a [`ContentFormatter`] and hands the result to a
//! [`PagePersistence`].

use crate::storage::StorageError;
use std::borrow::Cow;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(#[from] FormatError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Errors raised while converting page content
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("page has no content")]
    Empty,
}

/// Converted page content and the file extension it should be saved with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedContent {
    pub body: String,
    pub extension: &'static str,
}

/// Converts raw page markup into the configured output format
pub trait ContentFormatter: Send + Sync {
    fn convert(&self, raw: &str, url: &Url) -> Result<FormattedContent, FormatError>;

    /// Short format name recorded in the manifest
    fn name(&self) -> &'static str;

    /// File extension of converted pages, without the dot
    fn extension(&self) -> &'static str;
}

/// Persists formatted pages and downloaded assets
///
/// Implementations are called from the coordinator task only; they may block
/// briefly on the filesystem.
pub trait PagePersistence: Send + Sync {
    /// Saves a page and returns the path it was written to
    fn save(
        &self,
        url: &Url,
        title: Option<&str>,
        content: &FormattedContent,
    ) -> OutputResult<PathBuf>;

    /// Saves an asset and returns the path it was written to
    fn save_asset(&self, url: &Url, bytes: &[u8]) -> OutputResult<PathBuf>;

    /// Points same-site page links in `html` at their saved files
    ///
    /// `extension` is the one pages are saved with. The default leaves links
    /// pointing at the live site.
    fn localize_links<'a>(&self, html: &'a str, _page: &Url, _extension: &str) -> Cow<'a, str> {
        Cow::Borrowed(html)
    }
}
