//! Configuration module for doc-scribe
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use doc_scribe::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scribe.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetchBackendKind, FilterConfig, HttpConfig, OutputConfig, OutputFormat,
};

// Re-export parser functions
pub use parser::{compute_config_hash, hash_config_source, load_config, load_config_with_hash};
pub use validation::validate;
