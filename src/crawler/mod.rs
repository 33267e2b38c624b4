//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Page fetching over HTTP or a headless browser
//! - Retry with exponential backoff
//! - HTML parsing and link extraction
//! - Concurrent batch scheduling and the asset pool
//! - Overall crawl coordination and its event channel

#[cfg(feature = "browser")]
mod browser;
mod coordinator;
mod events;
mod fetcher;
#[cfg(test)]
pub(crate) mod mock;
mod parser;
mod retry;
mod scheduler;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use coordinator::{Coordinator, CrawlReport};
pub use events::{
    channel, AuxiliaryRequest, CrawlEvent, DiscoveredLinks, EventSink, Progress, ProgressKind,
};
pub use fetcher::{build_fetcher, build_http_client, FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use parser::{page_title, parse_html, ParsedPage};
pub use retry::{fetch_with_retry, Attempted, RetryPolicy};
pub use scheduler::{ClassifiedLink, FetchOutcome, FetchResult, FetchedContent, Scheduler};

use crate::config::{validate, Config};
use crate::output::{build_formatter, write_index, FileStore, Manifest};
use crate::storage::{RunStatus, SqliteStorage, Storage, StorageError};
use crate::url::{normalize_url, LinkCategory, SiteRoot};
use crate::ScribeError;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and build the fetch backend
/// 2. Open the run manifest and create a run
/// 3. Crawl through the coordinator, saving pages as they arrive
/// 4. Record failures and categorized links, and complete the run
/// 5. Write the documentation index
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Recorded with the run for provenance
/// * `cancel` - Cancelling ends the crawl early with a partial report
/// * `events` - Receives phase, progress and discovery events
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished or was cancelled
/// * `Err(ScribeError)` - Setup failed or the manifest could not be written
///
/// # Example
///
/// ```no_run
/// use doc_scribe::config::load_config_with_hash;
/// use doc_scribe::crawler::{run_crawl, EventSink};
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("scribe.toml"))?;
/// let report = run_crawl(&config, &hash, CancellationToken::new(), EventSink::none()).await?;
/// println!("{} pages saved", report.pages_downloaded);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    cancel: CancellationToken,
    events: EventSink,
) -> Result<CrawlReport, ScribeError> {
    validate(config)?;

    let fetcher = build_fetcher(config).await?;
    tracing::info!("Using {} fetcher", fetcher.name());

    run_crawl_with_fetcher(config, config_hash, fetcher, cancel, events).await
}

/// Runs a complete crawl on an already constructed fetch backend
///
/// The fetcher is shut down before this returns, on every path, including
/// setup errors that happen before the first page is requested.
pub async fn run_crawl_with_fetcher(
    config: &Config,
    config_hash: &str,
    fetcher: Arc<dyn PageFetcher>,
    cancel: CancellationToken,
    events: EventSink,
) -> Result<CrawlReport, ScribeError> {
    let (coordinator, storage, run_id) =
        match prepare(config, config_hash, Arc::clone(&fetcher), cancel) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("Crawl setup failed: {}", e);
                fetcher.shutdown().await;
                return Err(e);
            }
        };

    let mut coordinator = coordinator.with_events(events);
    let report = coordinator.crawl(None, config.crawler.interactive).await;

    let mut storage = storage.lock().map_err(|_| StorageError::LockPoisoned)?;
    storage.record_failures(run_id, &report.failed)?;
    for category in [
        LinkCategory::Documentation,
        LinkCategory::Auxiliary,
        LinkCategory::External,
        LinkCategory::Asset,
    ] {
        if let Some(links) = report.links(category) {
            storage.record_links(run_id, category, links)?;
        }
    }

    let status = if report.cancelled {
        RunStatus::Cancelled
    } else {
        RunStatus::Completed
    };
    storage.complete_run(
        run_id,
        status,
        report.pages_downloaded as u64,
        report.assets_downloaded as u64,
    )?;

    if config.output.write_index {
        write_index(&*storage, &config.output.directory)?;
    }

    Ok(report)
}

/// Opens the manifest, creates the run and wires up the coordinator
fn prepare(
    config: &Config,
    config_hash: &str,
    fetcher: Arc<dyn PageFetcher>,
    cancel: CancellationToken,
) -> Result<(Coordinator, Arc<Mutex<SqliteStorage>>, i64), ScribeError> {
    validate(config)?;
    let root = SiteRoot::new(&normalize_url(&config.crawler.start_url)?);
    let output = &config.output;
    std::fs::create_dir_all(&output.directory)?;

    let mut storage = SqliteStorage::new(&output.resolved_database_path())?;
    let run_id = storage.create_run(&config.crawler.start_url, config_hash)?;
    let storage = Arc::new(Mutex::new(storage));
    tracing::info!("Starting crawl run {} from {}", run_id, config.crawler.start_url);

    let formatter = build_formatter(output.format);
    let store = FileStore::new(&output.directory, root, formatter.name())
        .with_metadata(output.write_metadata)
        .with_classification(config.crawler.classification)
        .with_manifest(Manifest {
            storage: Arc::clone(&storage),
            run_id,
        });

    let coordinator = Coordinator::new(config, fetcher, formatter, Arc::new(store), cancel)?;
    Ok((coordinator, storage, run_id))
}
