/// Crawl orchestration phases
///
/// This module defines the states a crawl run moves through, and which moves are legal.
use std::fmt;

/// The orchestrator's position in a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Constructed, `crawl()` not yet called
    Idle,

    /// Validating and enqueueing start URLs
    SeedingFrontier,

    // ===== Crawling States =====
    /// Breadth-first fetch of documentation pages
    CrawlingDocumentation,

    /// Waiting on the caller to approve the auxiliary phase
    PromptingForAuxiliary,

    /// Fetching approved auxiliary pages
    CrawlingAuxiliary,

    // ===== Shutdown States =====
    /// Cancellation observed; no new batches are issued
    Cancelling,

    /// Releasing fetch backend resources and building the report
    Finalizing,

    /// Report returned
    Done,
}

impl CrawlPhase {
    /// Returns true while pages may still be fetched
    pub fn is_crawling(&self) -> bool {
        matches!(self, Self::CrawlingDocumentation | Self::CrawlingAuxiliary)
    }

    /// Returns true for the final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// `Cancelling` is reachable from every crawling state (seeding and the
    /// auxiliary prompt included), and always leads to `Finalizing`.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        match (self, next) {
            (Idle, SeedingFrontier) => true,
            (SeedingFrontier, CrawlingDocumentation | Finalizing | Cancelling) => true,
            (
                CrawlingDocumentation,
                PromptingForAuxiliary | CrawlingAuxiliary | Finalizing | Cancelling,
            ) => true,
            (PromptingForAuxiliary, CrawlingAuxiliary | Finalizing | Cancelling) => true,
            (CrawlingAuxiliary, Finalizing | Cancelling) => true,
            (Cancelling, Finalizing) => true,
            (Finalizing, Done) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SeedingFrontier => "seeding_frontier",
            Self::CrawlingDocumentation => "crawling_documentation",
            Self::PromptingForAuxiliary => "prompting_for_auxiliary",
            Self::CrawlingAuxiliary => "crawling_auxiliary",
            Self::Cancelling => "cancelling",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
