//! URL and content allow/deny filtering
//!
//! Patterns are case-insensitive regular expressions. For each of the two
//! targets (URL, page body):
//! - if include patterns exist, at least one must match
//! - any matching exclude pattern rejects, regardless of includes
//!
//! A rejection is not an error. Callers log it and drop the URL or page.

use crate::config::FilterConfig;
use crate::ConfigError;
use regex::{Regex, RegexBuilder};

/// Compiled include/exclude rules for one target
#[derive(Debug, Clone, Default)]
struct PatternList {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl PatternList {
    fn compile(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    fn allows(&self, haystack: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(haystack)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(haystack))
    }

    fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
        })
        .collect()
}

/// The filter engine: URL patterns and content patterns
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    url: PatternList,
    content: PatternList,
}

impl FilterSet {
    /// Compiles every pattern in the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(FilterSet)` - All patterns compiled
    /// * `Err(ConfigError::InvalidPattern)` - The first pattern that failed to compile
    pub fn new(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            url: PatternList::compile(&config.url_include, &config.url_exclude)?,
            content: PatternList::compile(&config.content_include, &config.content_exclude)?,
        })
    }

    /// Checks a URL against the URL include/exclude lists
    pub fn url_allowed(&self, url: &str) -> bool {
        self.url.allows(url)
    }

    /// Checks a page body against the content include/exclude lists
    pub fn content_allowed(&self, raw_content: &str) -> bool {
        self.content.allows(raw_content)
    }

    /// True when no pattern of any kind is configured
    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.content.is_empty()
    }
}
