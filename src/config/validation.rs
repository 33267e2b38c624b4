use crate::config::types::{Config, CrawlerConfig, FetchBackendKind, HttpConfig, OutputConfig};
use crate::filter::FilterSet;
use crate::url::normalize_url;
use crate::ConfigError;

const MAX_CONCURRENCY: usize = 64;
const MAX_DEPTH: u32 = 50;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_output_config(&config.output)?;
    FilterSet::new(&config.filters)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_start_url(&config.start_url)?;
    for extra in &config.extra_start_urls {
        validate_start_url(extra)?;
    }

    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.max_depth > MAX_DEPTH {
        return Err(ConfigError::Validation(format!(
            "max-depth must be <= {}, got {}",
            MAX_DEPTH, config.max_depth
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 (omit it for unlimited)".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.backoff_max_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-max-ms ({}) must be >= backoff-base-ms ({})",
            config.backoff_max_ms, config.backoff_base_ms
        )));
    }

    if config.fetch_backend == FetchBackendKind::Browser && !cfg!(feature = "browser") {
        return Err(ConfigError::Validation(
            "fetch-backend = \"browser\" requires building with the `browser` feature".to_string(),
        ));
    }

    Ok(())
}

fn validate_start_url(raw: &str) -> Result<(), ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::Validation(
            "start-url cannot be empty".to_string(),
        ));
    }

    normalize_url(raw)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", raw, e)))
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    for name in config.headers.keys() {
        if reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(ConfigError::Validation(format!(
                "invalid header name '{}'",
                name
            )));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
