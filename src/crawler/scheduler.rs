//! Fetch scheduler: bounded concurrent batches and the asset worker pool
//!
//! This module handles:
//! - Dispatching one task per frontier entry, bounded by a semaphore
//! - Driving each fetch through the retry policy
//! - Classifying the links of every fetched page against the crawl root
//! - Downloading assets on a separate pool with the same limit
//!
//! Workers never touch the frontier. They return [`FetchResult`]s and the
//! coordinator folds them back in.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, FetchedPage, PageFetcher};
use crate::crawler::retry::{fetch_with_retry, RetryPolicy};
use crate::state::FrontierEntry;
use crate::url::{classify_href, normalize, ClassificationMode, LinkCategory, SiteRoot};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A discovered link with its category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLink {
    pub url: Url,
    pub category: LinkCategory,
}

/// A successfully fetched page, ready for filtering and persistence
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// URL after redirects, normalized
    pub final_url: Url,
    pub title: Option<String>,
    pub content: String,
    /// Page links, classified relative to the final URL
    pub links: Vec<ClassifiedLink>,
}

impl FetchedContent {
    pub fn links_in(&self, category: LinkCategory) -> impl Iterator<Item = &Url> {
        self.links
            .iter()
            .filter(move |link| link.category == category)
            .map(|link| &link.url)
    }
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(FetchedContent),
    /// Terminal failure with the last error's description
    Failed(String),
    /// Cancellation was observed before or between attempts
    Cancelled,
}

/// Result of fetching one frontier entry
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub entry: FrontierEntry,
    pub attempts: u32,
    pub outcome: FetchOutcome,
}

/// Result of downloading one asset
#[derive(Debug)]
pub struct AssetResult {
    pub url: Url,
    pub attempts: u32,
    pub outcome: Result<Vec<u8>, FetchError>,
}

/// Dispatches frontier batches to the page fetcher
///
/// Cloning is cheap; clones share the fetcher, the concurrency permits and
/// the cancellation token.
#[derive(Clone)]
pub struct Scheduler {
    fetcher: Arc<dyn PageFetcher>,
    permits: Arc<Semaphore>,
    policy: Arc<RetryPolicy>,
    timeout: Duration,
    mode: ClassificationMode,
    concurrency: usize,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration (concurrency, timeout, retry shape)
    /// * `fetcher` - The page fetcher backend
    /// * `cancel` - Crawl-wide cancellation token
    pub fn new(
        config: &CrawlerConfig,
        fetcher: Arc<dyn PageFetcher>,
        cancel: CancellationToken,
    ) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(concurrency)),
            policy: Arc::new(RetryPolicy::from_config(config)),
            timeout: Duration::from_secs(config.timeout_secs),
            mode: config.classification,
            concurrency,
            cancel,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn fetcher(&self) -> &Arc<dyn PageFetcher> {
        &self.fetcher
    }

    /// Fetches every entry and returns once all of them have finished
    ///
    /// At most `concurrency` fetches are in flight. Results come back in
    /// completion order. A task that panics is reported as a failure of its
    /// entry rather than leaking.
    pub async fn fetch_batch(
        &self,
        entries: Vec<FrontierEntry>,
        root: &Arc<SiteRoot>,
    ) -> Vec<FetchResult> {
        let mut tasks = FuturesUnordered::new();

        for entry in entries {
            let worker = self.clone();
            let root = Arc::clone(root);
            let url = entry.url.clone();
            let handle = tokio::spawn(async move { worker.fetch_page(url, &root).await });
            tasks.push(async move { (entry, handle.await) });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some((entry, joined)) = tasks.next().await {
            let result = match joined {
                Ok((attempts, outcome)) => FetchResult {
                    entry,
                    attempts,
                    outcome,
                },
                Err(e) => {
                    tracing::error!("Fetch task for {} failed: {}", entry.url, e);
                    FetchResult {
                        entry,
                        attempts: 0,
                        outcome: FetchOutcome::Failed(format!("fetch task failed: {}", e)),
                    }
                }
            };
            results.push(result);
        }

        results
    }

    async fn fetch_page(&self, url: Url, root: &SiteRoot) -> (u32, FetchOutcome) {
        let _permit = tokio::select! {
            _ = self.cancel.cancelled() => return (0, FetchOutcome::Cancelled),
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return (0, FetchOutcome::Cancelled),
            },
        };

        let fetcher = &*self.fetcher;
        let target = &url;
        let timeout = self.timeout;
        let attempted = fetch_with_retry(&self.policy, &self.cancel, url.as_str(), || {
            fetcher.fetch(target, timeout)
        })
        .await;

        let outcome = match attempted.outcome {
            Ok(page) => FetchOutcome::Fetched(classify_page(page, &url, root, self.mode)),
            Err(FetchError::Cancelled) => FetchOutcome::Cancelled,
            Err(e) => {
                tracing::error!(
                    "Failed {} after {} attempt(s): {}",
                    url,
                    attempted.attempts,
                    e
                );
                FetchOutcome::Failed(e.to_string())
            }
        };

        (attempted.attempts, outcome)
    }

    /// Creates an asset pool sharing this scheduler's fetcher and limits
    pub fn asset_pool(&self) -> AssetPool {
        AssetPool {
            fetcher: Arc::clone(&self.fetcher),
            permits: Arc::new(Semaphore::new(self.concurrency)),
            policy: Arc::clone(&self.policy),
            timeout: self.timeout,
            cancel: self.cancel.clone(),
            tasks: JoinSet::new(),
        }
    }
}

/// Classifies the links of a fetched page
///
/// Links are resolved against the final URL. Asset references from
/// `img`/`script`/`link` tags are Asset regardless of their path shape.
fn classify_page(
    page: FetchedPage,
    requested: &Url,
    root: &SiteRoot,
    mode: ClassificationMode,
) -> FetchedContent {
    let final_url = normalize(page.final_url.as_str(), &page.final_url)
        .unwrap_or_else(|| requested.clone());

    let mut links: Vec<ClassifiedLink> = Vec::with_capacity(page.links.len() + page.assets.len());
    for href in &page.links {
        match classify_href(href, &final_url, root, mode) {
            (Some(url), category) if category != LinkCategory::Invalid => {
                links.push(ClassifiedLink { url, category })
            }
            _ => tracing::trace!("Dropping invalid link {} on {}", href, final_url),
        }
    }
    for href in &page.assets {
        if let Some(url) = normalize(href, &final_url) {
            if !links.iter().any(|l| l.url == url) {
                links.push(ClassifiedLink {
                    url,
                    category: LinkCategory::Asset,
                });
            }
        }
    }

    FetchedContent {
        final_url,
        title: page.title,
        content: page.content,
        links,
    }
}

/// Background asset downloads with their own concurrency limit
///
/// Results are collected opportunistically between page batches, so asset
/// work never delays the page crawl.
pub struct AssetPool {
    fetcher: Arc<dyn PageFetcher>,
    permits: Arc<Semaphore>,
    policy: Arc<RetryPolicy>,
    timeout: Duration,
    cancel: CancellationToken,
    tasks: JoinSet<AssetResult>,
}

impl AssetPool {
    pub fn spawn(&mut self, url: Url) {
        let fetcher = Arc::clone(&self.fetcher);
        let permits = Arc::clone(&self.permits);
        let policy = Arc::clone(&self.policy);
        let cancel = self.cancel.clone();
        let timeout = self.timeout;

        self.tasks.spawn(async move {
            let permit = tokio::select! {
                _ = cancel.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                return AssetResult {
                    url,
                    attempts: 0,
                    outcome: Err(FetchError::Cancelled),
                };
            };

            // Yield once so queued page work runs first
            tokio::task::yield_now().await;

            let target = &url;
            let fetcher = &*fetcher;
            let attempted = fetch_with_retry(&policy, &cancel, url.as_str(), || {
                fetcher.fetch_asset(target, timeout)
            })
            .await;

            AssetResult {
                attempts: attempted.attempts,
                outcome: attempted.outcome,
                url,
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Collects finished downloads without waiting
    pub fn drain_ready(&mut self) -> Vec<AssetResult> {
        let mut ready = Vec::new();
        while let Some(Some(joined)) = self.tasks.join_next().now_or_never() {
            if let Some(result) = Self::unpack(joined) {
                ready.push(result);
            }
        }
        ready
    }

    /// Waits for every outstanding download
    pub async fn drain_all(&mut self) -> Vec<AssetResult> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            if let Some(result) = Self::unpack(joined) {
                results.push(result);
            }
        }
        results
    }

    fn unpack(joined: Result<AssetResult, tokio::task::JoinError>) -> Option<AssetResult> {
        match joined {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::error!("Asset task failed: {}", e);
                None
            }
        }
    }
}
