//! Crawl frontier and accumulated crawl state
//!
//! The frontier is owned by the orchestrator and mutated only from its task;
//! fetch workers hand results back instead of touching it.

use crate::url::LinkCategory;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use url::Url;

/// A URL waiting to be fetched, with the depth at which it was discovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
}

/// Everything a crawl has learned so far
#[derive(Debug, Clone, Default)]
pub struct CrawlState {
    /// URLs whose fetch has completed (successfully or not)
    pub visited: HashSet<String>,

    /// URLs pending in the frontier or in flight
    pub queued: HashSet<String>,

    pub doc_links: BTreeSet<String>,
    pub aux_links: BTreeSet<String>,
    pub external_links: BTreeSet<String>,
    pub asset_links: BTreeSet<String>,

    /// URL -> last error description
    pub failed: BTreeMap<String, String>,

    pub pages_downloaded: usize,
    pub assets_downloaded: usize,
}

impl CrawlState {
    /// The category set a link belongs in, if it is tracked at all
    fn links_mut(&mut self, category: LinkCategory) -> Option<&mut BTreeSet<String>> {
        match category {
            LinkCategory::Documentation => Some(&mut self.doc_links),
            LinkCategory::Auxiliary => Some(&mut self.aux_links),
            LinkCategory::External => Some(&mut self.external_links),
            LinkCategory::Asset => Some(&mut self.asset_links),
            LinkCategory::Invalid => None,
        }
    }
}

/// FIFO frontier with the single dedup gate for every producer
#[derive(Debug)]
pub struct Frontier {
    state: CrawlState,
    pending: VecDeque<FrontierEntry>,
    max_depth: u32,
}

impl Frontier {
    pub fn new(max_depth: u32) -> Self {
        Self {
            state: CrawlState::default(),
            pending: VecDeque::new(),
            max_depth,
        }
    }

    /// Clears all state for a new crawl
    pub fn reset(&mut self) {
        self.state = CrawlState::default();
        self.pending.clear();
    }

    /// Adds a URL to the frontier unless it is known or too deep
    ///
    /// # Returns
    ///
    /// * `true` - The URL was enqueued
    /// * `false` - Already visited, already queued, or `depth > max_depth`
    pub fn try_enqueue(&mut self, url: Url, depth: u32) -> bool {
        if depth > self.max_depth {
            return false;
        }

        let key = url.as_str();
        if self.state.visited.contains(key) || self.state.queued.contains(key) {
            return false;
        }

        self.state.queued.insert(key.to_string());
        self.pending.push_back(FrontierEntry { url, depth });
        true
    }

    /// Pops up to `n` entries in discovery order
    ///
    /// Popped URLs stay in `queued` until [`Frontier::mark_visited`] so they
    /// cannot be re-enqueued while in flight.
    pub fn dequeue_batch(&mut self, n: usize) -> Vec<FrontierEntry> {
        let count = n.min(self.pending.len());
        self.pending.drain(..count).collect()
    }

    /// Moves a URL from `queued` to `visited`
    pub fn mark_visited(&mut self, url: &Url) {
        let key = url.as_str();
        self.state.queued.remove(key);
        self.state.visited.insert(key.to_string());
    }

    /// Takes over a URL that a fetch was redirected to
    ///
    /// A target still waiting in the queue is pulled out so it is not fetched
    /// again. Returns `false` when the target is visited or in flight; its own
    /// fetch accounts for the page then.
    pub fn claim(&mut self, url: &Url) -> bool {
        let key = url.as_str();
        if self.state.visited.contains(key) {
            return false;
        }
        if self.state.queued.contains(key) {
            let before = self.pending.len();
            self.pending.retain(|entry| entry.url != *url);
            if self.pending.len() == before {
                return false;
            }
        }
        self.mark_visited(url);
        true
    }

    /// Records a terminal failure; the last reason for a URL wins
    pub fn record_failure(&mut self, url: &Url, reason: impl Into<String>) {
        self.state.failed.insert(url.to_string(), reason.into());
    }

    /// Adds a link to its category set
    ///
    /// # Returns
    ///
    /// `true` if the link had not been seen in that category before.
    /// Invalid links are never recorded.
    pub fn record_categorized(&mut self, category: LinkCategory, url: &Url) -> bool {
        match self.state.links_mut(category) {
            Some(set) => set.insert(url.to_string()),
            None => false,
        }
    }

    pub fn record_page_downloaded(&mut self) -> usize {
        self.state.pages_downloaded += 1;
        self.state.pages_downloaded
    }

    pub fn record_asset_downloaded(&mut self) -> usize {
        self.state.assets_downloaded += 1;
        self.state.assets_downloaded
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn into_state(self) -> CrawlState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://docs.example.com{}", path)).unwrap()
    }

    #[test]
    fn test_enqueue_and_dequeue_fifo() {
        let mut frontier = Frontier::new(3);
        assert!(frontier.try_enqueue(url("/a"), 0));
        assert!(frontier.try_enqueue(url("/b"), 1));
        assert!(frontier.try_enqueue(url("/c"), 1));

        let batch = frontier.dequeue_batch(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].url, url("/a"));
        assert_eq!(batch[1].url, url("/b"));
        assert_eq!(frontier.pending_len(), 1);
    }

    #[test]
    fn test_dequeue_more_than_available() {
        let mut frontier = Frontier::new(3);
        frontier.try_enqueue(url("/a"), 0);
        assert_eq!(frontier.dequeue_batch(10).len(), 1);
        assert!(frontier.dequeue_batch(10).is_empty());
    }

    #[test]
    fn test_duplicate_enqueue_rejected() {
        let mut frontier = Frontier::new(3);
        assert!(frontier.try_enqueue(url("/a"), 0));
        assert!(!frontier.try_enqueue(url("/a"), 1));
        assert_eq!(frontier.pending_len(), 1);
    }

    #[test]
    fn test_in_flight_url_not_reenqueued() {
        let mut frontier = Frontier::new(3);
        frontier.try_enqueue(url("/a"), 0);
        let _ = frontier.dequeue_batch(1);
        assert!(!frontier.try_enqueue(url("/a"), 1));
    }

    #[test]
    fn test_visited_url_never_reenters() {
        let mut frontier = Frontier::new(3);
        frontier.try_enqueue(url("/a"), 0);
        let batch = frontier.dequeue_batch(1);
        frontier.mark_visited(&batch[0].url);

        assert!(!frontier.state().queued.contains(url("/a").as_str()));
        assert!(frontier.state().visited.contains(url("/a").as_str()));
        assert!(!frontier.try_enqueue(url("/a"), 0));
    }

    #[test]
    fn test_claim_redirect_target() {
        let mut frontier = Frontier::new(3);
        frontier.try_enqueue(url("/a"), 0);
        frontier.try_enqueue(url("/b"), 0);
        frontier.try_enqueue(url("/c"), 0);
        let in_flight = frontier.dequeue_batch(1);

        // Pending target is taken out of the queue
        assert!(frontier.claim(&url("/c")));
        assert_eq!(frontier.pending_len(), 1);
        assert!(frontier.state().visited.contains(url("/c").as_str()));

        // In-flight and visited targets belong to their own fetch
        assert!(!frontier.claim(&in_flight[0].url));
        assert!(!frontier.claim(&url("/c")));

        // Unknown target becomes visited
        assert!(frontier.claim(&url("/d")));
        assert!(!frontier.try_enqueue(url("/d"), 1));
    }

    #[test]
    fn test_depth_bound() {
        let mut frontier = Frontier::new(2);
        assert!(frontier.try_enqueue(url("/two"), 2));
        assert!(!frontier.try_enqueue(url("/three"), 3));
    }

    #[test]
    fn test_record_categorized_reports_new_links() {
        let mut frontier = Frontier::new(2);
        assert!(frontier.record_categorized(LinkCategory::Auxiliary, &url("/pricing")));
        assert!(!frontier.record_categorized(LinkCategory::Auxiliary, &url("/pricing")));
        assert!(!frontier.record_categorized(LinkCategory::Invalid, &url("/x")));
        assert_eq!(frontier.state().aux_links.len(), 1);
    }

    #[test]
    fn test_record_failure_keeps_last_reason() {
        let mut frontier = Frontier::new(2);
        frontier.record_failure(&url("/a"), "HTTP 500");
        frontier.record_failure(&url("/a"), "timeout");
        assert_eq!(
            frontier.state().failed.get(url("/a").as_str()),
            Some(&"timeout".to_string())
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut frontier = Frontier::new(2);
        frontier.try_enqueue(url("/a"), 0);
        frontier.record_page_downloaded();
        frontier.record_failure(&url("/b"), "x");
        frontier.reset();

        assert!(frontier.is_empty());
        assert_eq!(frontier.state().pages_downloaded, 0);
        assert!(frontier.state().failed.is_empty());
        assert!(frontier.try_enqueue(url("/a"), 0));
    }
}
