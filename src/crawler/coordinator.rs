//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that drives a run through its phases:
//! - Seeding the frontier from the start URLs
//! - Breadth-first documentation crawl in concurrent batches
//! - Optional auxiliary crawl, gated on an external confirmation
//! - Cooperative cancellation and final resource release
//!
//! The coordinator is the only writer of the [`Frontier`]. Fetch workers
//! return results and the coordinator folds them back in between batches.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::events::{CrawlEvent, DiscoveredLinks, EventSink, Progress, ProgressKind};
use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::scheduler::{AssetPool, AssetResult, FetchOutcome, FetchResult, FetchedContent, Scheduler};
use crate::filter::FilterSet;
use crate::output::{ContentFormatter, PagePersistence};
use crate::state::{CrawlPhase, CrawlState, Frontier};
use crate::url::{classify, normalize_url, ClassificationMode, LinkCategory, SiteRoot};
use crate::ScribeError;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Final tally of a crawl run
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub pages_downloaded: usize,
    pub assets_downloaded: usize,

    /// URL -> last error description
    pub failed: BTreeMap<String, String>,

    pub doc_links: BTreeSet<String>,
    pub aux_links: BTreeSet<String>,
    pub external_links: BTreeSet<String>,
    pub asset_links: BTreeSet<String>,

    /// Every phase entered, in order
    pub phases: Vec<CrawlPhase>,

    /// True when the run ended because cancellation was requested
    pub cancelled: bool,
}

impl CrawlReport {
    fn from_state(state: CrawlState, phases: Vec<CrawlPhase>, cancelled: bool) -> Self {
        Self {
            pages_downloaded: state.pages_downloaded,
            assets_downloaded: state.assets_downloaded,
            failed: state.failed,
            doc_links: state.doc_links,
            aux_links: state.aux_links,
            external_links: state.external_links,
            asset_links: state.asset_links,
            phases,
            cancelled,
        }
    }

    /// The categorized set for `category`, if it is tracked
    pub fn links(&self, category: LinkCategory) -> Option<&BTreeSet<String>> {
        match category {
            LinkCategory::Documentation => Some(&self.doc_links),
            LinkCategory::Auxiliary => Some(&self.aux_links),
            LinkCategory::External => Some(&self.external_links),
            LinkCategory::Asset => Some(&self.asset_links),
            LinkCategory::Invalid => None,
        }
    }
}

/// Why a phase's batch loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseEnd {
    Drained,
    PageCap,
    Cancelled,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    crawler: CrawlerConfig,
    start_urls: Vec<String>,
    filters: FilterSet,
    scheduler: Scheduler,
    formatter: Arc<dyn ContentFormatter>,
    persistence: Arc<dyn PagePersistence>,
    frontier: Frontier,
    assets: AssetPool,
    assets_seen: HashSet<String>,
    events: EventSink,
    cancel: CancellationToken,
    phase: CrawlPhase,
    phases: Vec<CrawlPhase>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The full configuration; filters are compiled here
    /// * `fetcher` - Page fetcher backend, shut down when a crawl finalizes
    /// * `formatter` - Converts fetched markup before it is saved
    /// * `persistence` - Receives every accepted page and asset
    /// * `cancel` - Crawl-wide cancellation token
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to crawl
    /// * `Err(ScribeError)` - A filter pattern failed to compile
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        formatter: Arc<dyn ContentFormatter>,
        persistence: Arc<dyn PagePersistence>,
        cancel: CancellationToken,
    ) -> Result<Self, ScribeError> {
        let filters = FilterSet::new(&config.filters)?;
        let scheduler = Scheduler::new(&config.crawler, fetcher, cancel.clone());
        let assets = scheduler.asset_pool();

        Ok(Self {
            crawler: config.crawler.clone(),
            start_urls: config.start_urls(),
            filters,
            scheduler,
            formatter,
            persistence,
            frontier: Frontier::new(config.crawler.max_depth),
            assets,
            assets_seen: HashSet::new(),
            events: EventSink::none(),
            cancel,
            phase: CrawlPhase::Idle,
            phases: Vec::new(),
        })
    }

    /// Publishes crawl events to `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Runs a crawl to completion and returns its tally
    ///
    /// `start_urls` overrides the configured seeds. The auxiliary phase is
    /// only considered when `interactive` is set; approval comes from the
    /// event subscriber.
    ///
    /// Per-page failures never abort the crawl. They end up in
    /// [`CrawlReport::failed`]. The fetch backend is shut down before this
    /// returns, on every path, including cancellation.
    pub async fn crawl(&mut self, start_urls: Option<&[String]>, interactive: bool) -> CrawlReport {
        self.reset();

        let seeds = match start_urls {
            Some(urls) => urls.to_vec(),
            None => self.start_urls.clone(),
        };

        self.transition(CrawlPhase::SeedingFrontier);
        let root = self.seed(&seeds);

        match root {
            Some(_) if self.cancel.is_cancelled() => self.transition(CrawlPhase::Cancelling),
            Some(root) => {
                self.transition(CrawlPhase::CrawlingDocumentation);
                let mut end = self.run_phase(&root).await;

                if end == PhaseEnd::Drained && interactive {
                    end = self.auxiliary_phase(&root).await;
                }

                if end == PhaseEnd::Cancelled || self.cancel.is_cancelled() {
                    self.transition(CrawlPhase::Cancelling);
                }
            }
            None => tracing::warn!("No valid start URL in {:?}; nothing to crawl", seeds),
        }

        self.finalize().await
    }

    fn reset(&mut self) {
        self.frontier.reset();
        self.assets = self.scheduler.asset_pool();
        self.assets_seen.clear();
        self.phase = CrawlPhase::Idle;
        self.phases.clear();
    }

    fn transition(&mut self, next: CrawlPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!("Unexpected phase transition {} -> {}", self.phase, next);
        }
        tracing::info!("Phase: {} -> {}", self.phase, next);

        self.phase = next;
        self.phases.push(next);
        self.events.emit(CrawlEvent::PhaseChanged(next));
    }

    /// Enqueues every valid seed at depth 0
    ///
    /// The first seed that normalizes defines the site root. Seeds are not
    /// subject to the URL filter. Returns `None` when nothing was enqueued.
    fn seed(&mut self, seeds: &[String]) -> Option<Arc<SiteRoot>> {
        let mut root: Option<Arc<SiteRoot>> = None;

        for seed in seeds {
            let url = match normalize_url(seed) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping start URL {}: {}", seed, e);
                    continue;
                }
            };

            let site: &SiteRoot = root.get_or_insert_with(|| Arc::new(SiteRoot::new(&url)));

            if self.crawler.classification == ClassificationMode::Strict {
                let category = classify(&url, site, ClassificationMode::Strict);
                if matches!(category, LinkCategory::Invalid | LinkCategory::External) {
                    tracing::warn!("Skipping start URL {}: classified {}", url, category.as_str());
                    continue;
                }
            }

            if self.frontier.try_enqueue(url.clone(), 0) {
                tracing::debug!("Seeded {}", url);
            }
        }

        if self.frontier.is_empty() {
            return None;
        }
        root
    }

    /// Batch loop shared by both phases
    async fn run_phase(&mut self, root: &Arc<SiteRoot>) -> PhaseEnd {
        let delay = Duration::from_millis(self.crawler.delay_ms);

        loop {
            if self.cancel.is_cancelled() {
                return PhaseEnd::Cancelled;
            }
            if self.cap_reached() {
                return PhaseEnd::PageCap;
            }
            if self.frontier.is_empty() {
                return PhaseEnd::Drained;
            }

            let batch = self.frontier.dequeue_batch(self.batch_size());
            tracing::info!(
                "Fetching batch of {} ({} pending, {} saved)",
                batch.len(),
                self.frontier.pending_len(),
                self.frontier.state().pages_downloaded
            );

            let results = self.scheduler.fetch_batch(batch, root).await;
            let mut discovered = DiscoveredLinks::default();
            for result in results {
                self.process_result(result, &mut discovered);
            }
            if !discovered.is_empty() {
                self.events.emit(CrawlEvent::LinksDiscovered(discovered));
            }

            let ready = self.assets.drain_ready();
            self.record_assets(ready);

            if self.cancel.is_cancelled() {
                return PhaseEnd::Cancelled;
            }
            if self.cap_reached() {
                tracing::info!("Page cap reached");
                return PhaseEnd::PageCap;
            }
            if self.frontier.is_empty() {
                return PhaseEnd::Drained;
            }

            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return PhaseEnd::Cancelled,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    /// Asks whether to crawl the auxiliary links, and crawls them if approved
    async fn auxiliary_phase(&mut self, root: &Arc<SiteRoot>) -> PhaseEnd {
        let candidates = self.auxiliary_candidates();
        if candidates.is_empty() {
            tracing::debug!("No auxiliary links to offer");
            return PhaseEnd::Drained;
        }

        self.transition(CrawlPhase::PromptingForAuxiliary);
        let approved = self
            .events
            .confirm_auxiliary(candidates.clone(), &self.cancel)
            .await;

        if self.cancel.is_cancelled() {
            return PhaseEnd::Cancelled;
        }
        if !approved {
            tracing::info!("Auxiliary crawl declined ({} links)", candidates.len());
            return PhaseEnd::Drained;
        }

        for candidate in &candidates {
            let Ok(url) = Url::parse(candidate) else {
                continue;
            };
            if !self.filters.url_allowed(url.as_str()) {
                tracing::debug!("Filtered auxiliary link {}", url);
                continue;
            }
            self.frontier.try_enqueue(url, 0);
        }

        self.transition(CrawlPhase::CrawlingAuxiliary);
        self.run_phase(root).await
    }

    /// Auxiliary links neither fetched nor pending
    fn auxiliary_candidates(&self) -> Vec<String> {
        let state = self.frontier.state();
        state
            .aux_links
            .iter()
            .filter(|url| !state.visited.contains(*url) && !state.queued.contains(*url))
            .cloned()
            .collect()
    }

    async fn finalize(&mut self) -> CrawlReport {
        self.transition(CrawlPhase::Finalizing);

        if self.assets.in_flight() > 0 {
            tracing::info!("Waiting for {} asset download(s)", self.assets.in_flight());
        }
        let remaining = self.assets.drain_all().await;
        self.record_assets(remaining);

        let fetcher = Arc::clone(self.scheduler.fetcher());
        tracing::debug!("Shutting down {} fetcher", fetcher.name());
        fetcher.shutdown().await;

        self.transition(CrawlPhase::Done);

        let frontier = std::mem::replace(&mut self.frontier, Frontier::new(self.crawler.max_depth));
        let report = CrawlReport::from_state(
            frontier.into_state(),
            std::mem::take(&mut self.phases),
            self.cancel.is_cancelled(),
        );

        tracing::info!(
            "Crawl finished: {} pages, {} assets, {} failures{}",
            report.pages_downloaded,
            report.assets_downloaded,
            report.failed.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    fn cap_reached(&self) -> bool {
        self.crawler
            .max_pages
            .is_some_and(|cap| self.frontier.state().pages_downloaded >= cap)
    }

    fn batch_size(&self) -> usize {
        let concurrency = self.scheduler.concurrency();
        match self.crawler.max_pages {
            Some(cap) => concurrency.min(cap.saturating_sub(self.frontier.state().pages_downloaded)),
            None => concurrency,
        }
    }

    fn process_result(&mut self, result: FetchResult, discovered: &mut DiscoveredLinks) {
        let FetchResult {
            entry,
            attempts,
            outcome,
        } = result;

        match outcome {
            // Left in `queued`: it was never fetched
            FetchOutcome::Cancelled => tracing::debug!("Fetch of {} cancelled", entry.url),
            FetchOutcome::Failed(reason) => {
                self.frontier.mark_visited(&entry.url);
                self.frontier.record_failure(&entry.url, reason);
            }
            FetchOutcome::Fetched(page) => {
                self.frontier.mark_visited(&entry.url);
                if attempts > 1 {
                    tracing::debug!("Fetched {} after {} attempts", entry.url, attempts);
                }
                self.accept_page(&entry.url, entry.depth, page, discovered);
            }
        }
    }

    fn accept_page(
        &mut self,
        requested: &Url,
        depth: u32,
        page: FetchedContent,
        discovered: &mut DiscoveredLinks,
    ) {
        if page.final_url != *requested && !self.frontier.claim(&page.final_url) {
            tracing::debug!("{} redirects to {}, already crawled", requested, page.final_url);
            return;
        }

        if !self.filters.content_allowed(&page.content) {
            tracing::debug!("Content filter rejected {}", page.final_url);
            return;
        }

        self.record_links(&page, discovered);

        if self.cap_reached() {
            tracing::debug!("Page cap reached, not saving {}", page.final_url);
            return;
        }
        self.save_page(requested, &page);

        for link in page.links_in(LinkCategory::Documentation) {
            if !self.filters.url_allowed(link.as_str()) {
                tracing::debug!("URL filter rejected {}", link);
                continue;
            }
            if self.frontier.try_enqueue(link.clone(), depth + 1) {
                tracing::debug!("Enqueued {} at depth {}", link, depth + 1);
            }
        }

        if self.crawler.include_assets {
            for asset in page.links_in(LinkCategory::Asset) {
                if self.assets_seen.insert(asset.to_string()) {
                    self.assets.spawn(asset.clone());
                }
            }
        }
    }

    /// Records every link of a page, adding the ones not seen before to `discovered`
    fn record_links(&mut self, page: &FetchedContent, discovered: &mut DiscoveredLinks) {
        for link in &page.links {
            if !self.frontier.record_categorized(link.category, &link.url) {
                continue;
            }
            let bucket = match link.category {
                LinkCategory::Documentation => &mut discovered.documentation,
                LinkCategory::Auxiliary => &mut discovered.auxiliary,
                LinkCategory::External => &mut discovered.external,
                LinkCategory::Asset => &mut discovered.assets,
                LinkCategory::Invalid => continue,
            };
            bucket.push(link.url.to_string());
        }
    }

    fn save_page(&mut self, requested: &Url, page: &FetchedContent) {
        let html = self.persistence.localize_links(
            &page.content,
            &page.final_url,
            self.formatter.extension(),
        );
        let formatted = match self.formatter.convert(&html, &page.final_url) {
            Ok(formatted) => formatted,
            Err(e) => {
                tracing::warn!("Could not format {}: {}", page.final_url, e);
                self.frontier
                    .record_failure(requested, format!("format: {}", e));
                return;
            }
        };

        match self
            .persistence
            .save(&page.final_url, page.title.as_deref(), &formatted)
        {
            Ok(path) => {
                let current = self.frontier.record_page_downloaded();
                tracing::info!("[{}] Saved {} -> {}", current, page.final_url, path.display());
                self.events.emit(CrawlEvent::Progress(Progress {
                    kind: ProgressKind::Page,
                    url: page.final_url.to_string(),
                    current,
                    total: self.crawler.max_pages,
                }));
            }
            Err(e) => {
                tracing::warn!("Could not save {}: {}", page.final_url, e);
                self.frontier
                    .record_failure(requested, format!("persistence: {}", e));
            }
        }
    }

    fn record_assets(&mut self, results: Vec<AssetResult>) {
        for result in results {
            let bytes = match result.outcome {
                Ok(bytes) => bytes,
                Err(FetchError::Cancelled) => continue,
                Err(e) => {
                    tracing::warn!("Asset {} failed: {}", result.url, e);
                    self.frontier.record_failure(&result.url, e.to_string());
                    continue;
                }
            };

            match self.persistence.save_asset(&result.url, &bytes) {
                Ok(_) => {
                    let current = self.frontier.record_asset_downloaded();
                    self.events.emit(CrawlEvent::Progress(Progress {
                        kind: ProgressKind::Asset,
                        url: result.url.to_string(),
                        current,
                        total: None,
                    }));
                }
                Err(e) => {
                    tracing::warn!("Could not save asset {}: {}", result.url, e);
                    self.frontier
                        .record_failure(&result.url, format!("persistence: {}", e));
                }
            }
        }
    }
}
