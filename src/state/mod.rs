//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Frontier`: the FIFO queue of URLs to fetch plus the accumulated `CrawlState`
//! - `FetchAttempt`: per-URL retry state machine
//! - `CrawlPhase`: the orchestrator's phase state machine

mod attempt;
mod frontier;
mod phase;

// Re-export main types
pub use attempt::FetchAttempt;
pub use frontier::{CrawlState, Frontier, FrontierEntry};
pub use phase::CrawlPhase;
