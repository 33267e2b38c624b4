//! Crawl events published to an optional subscriber
//!
//! The coordinator never blocks on a subscriber except for the auxiliary
//! confirmation, which is answered through a oneshot channel.

use crate::state::CrawlPhase;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// What a progress event counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Page,
    Asset,
}

/// One item finished processing
#[derive(Debug, Clone)]
pub struct Progress {
    pub kind: ProgressKind,
    pub url: String,
    /// Items processed so far, this one included
    pub current: usize,
    /// Known upper bound, if any
    pub total: Option<usize>,
}

/// Links first classified during one batch, grouped by category
#[derive(Debug, Clone, Default)]
pub struct DiscoveredLinks {
    pub documentation: Vec<String>,
    pub auxiliary: Vec<String>,
    pub external: Vec<String>,
    pub assets: Vec<String>,
}

impl DiscoveredLinks {
    pub fn is_empty(&self) -> bool {
        self.documentation.is_empty()
            && self.auxiliary.is_empty()
            && self.external.is_empty()
            && self.assets.is_empty()
    }
}

/// Request to confirm crawling the auxiliary links
#[derive(Debug)]
pub struct AuxiliaryRequest {
    pub links: Vec<String>,
    respond: oneshot::Sender<bool>,
}

impl AuxiliaryRequest {
    /// Answers the request; dropping it unanswered counts as "no"
    pub fn respond(self, crawl: bool) {
        let _ = self.respond.send(crawl);
    }
}

#[derive(Debug)]
pub enum CrawlEvent {
    PhaseChanged(CrawlPhase),
    Progress(Progress),
    LinksDiscovered(DiscoveredLinks),
    AuxiliaryConfirmation(AuxiliaryRequest),
}

/// Sending half held by the coordinator
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<CrawlEvent>>,
}

impl EventSink {
    /// A sink with no subscriber; every event is dropped
    pub fn none() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: CrawlEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("Event subscriber has gone away");
            }
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Asks the subscriber whether to crawl `links`
    ///
    /// Resolves to `false` without a subscriber, when the request is dropped
    /// unanswered, or when `cancel` fires first.
    pub async fn confirm_auxiliary(&self, links: Vec<String>, cancel: &CancellationToken) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        let (respond, answer) = oneshot::channel();
        if tx
            .send(CrawlEvent::AuxiliaryConfirmation(AuxiliaryRequest { links, respond }))
            .is_err()
        {
            return false;
        }

        tokio::select! {
            _ = cancel.cancelled() => false,
            answer = answer => answer.unwrap_or(false),
        }
    }
}

/// Creates a connected sink and receiver
pub fn channel() -> (EventSink, mpsc::UnboundedReceiver<CrawlEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx: Some(tx) }, rx)
}
