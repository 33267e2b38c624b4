//! Output module for converting and persisting crawled pages
//!
//! This module handles:
//! - Converting page markup into the configured output format
//! - Writing pages, assets and metadata below the output directory
//! - Pointing same-site links at the saved copies
//! - Generating the documentation index and crawl statistics

mod formatter;
pub mod index;
mod markup;
mod persistence;
pub mod stats;
mod traits;

pub use formatter::{build_formatter, HtmlFormatter, JsonFormatter, MarkdownFormatter, TextFormatter};
pub use index::{format_index, write_index};
pub use persistence::{slugify, FileStore, Manifest, ASSETS_DIR, METADATA_DIR};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{
    ContentFormatter, FormatError, FormattedContent, OutputError, OutputResult, PagePersistence,
};
