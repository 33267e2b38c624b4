//! Scripted page fetcher for engine tests

use crate::crawler::fetcher::{FetchError, FetchedPage, PageFetcher};
use crate::crawler::parser::parse_html;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

type Response = Result<String, FetchError>;

/// Serves canned HTML per URL; the last scripted response repeats
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Response>>>,
    redirects: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    shutdowns: AtomicUsize,
    delay: Duration,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.script(url, vec![Ok(html.to_string())])
    }

    pub fn script(self, url: &str, responses: Vec<Response>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(url.to_string(), responses.into());
        }
        self
    }

    /// Fetching `from` lands on `to` and serves its script
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Number of fetch calls made for `url`
    pub fn calls_for(&self, url: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|c| c.as_str() == url).count())
            .unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &Url) -> Response {
        let Ok(mut scripts) = self.scripts.lock() else {
            return Err(FetchError::Malformed("poisoned".to_string()));
        };
        match scripts.get_mut(url.as_str()) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Err(FetchError::NotFound)),
            Some(queue) => queue.front().cloned().unwrap_or(Err(FetchError::NotFound)),
            None => Err(FetchError::NotFound),
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        let final_url = match self.redirects.get(url.as_str()) {
            Some(to) => Url::parse(to).map_err(|e| FetchError::Malformed(e.to_string()))?,
            None => url.clone(),
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let response = self.next_response(&final_url);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let html = response?;
        let parsed = parse_html(&html, &final_url);
        Ok(FetchedPage {
            final_url,
            status_code: 200,
            content_type: Some("text/html".to_string()),
            content: html,
            title: parsed.title,
            links: parsed.links,
            assets: parsed.assets,
        })
    }

    async fn fetch_asset(&self, url: &Url, _timeout: Duration) -> Result<Vec<u8>, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        self.next_response(url).map(String::into_bytes)
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
