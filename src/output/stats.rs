//! Statistics generation from the crawl manifest
//!
//! This module provides functionality for extracting and displaying
//! statistics of the most recent crawl run.

use crate::storage::{FailureRecord, RunStatus, Storage, StorageError};
use crate::url::LinkCategory;
use crate::ScribeError;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub run_id: i64,
    pub start_url: String,
    pub status: RunStatus,

    /// Wall-clock duration, known once the run has finished
    pub duration_seconds: Option<u64>,

    pub pages_downloaded: u64,
    pub assets_downloaded: u64,

    /// Discovered links by category
    pub links_by_category: HashMap<LinkCategory, u64>,

    pub failures: Vec<FailureRecord>,
}

/// Loads statistics for the latest run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(ScribeError)` - No runs recorded, or the query failed
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, ScribeError> {
    let run = storage.get_latest_run()?.ok_or(StorageError::NoRuns)?;

    let duration_seconds = run.finished_at.as_deref().and_then(|finished| {
        let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
        let finished = finished.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
        u64::try_from((finished - started).num_seconds()).ok()
    });

    let links_by_category = storage.count_links_by_category(run.id)?;
    let failures = storage.list_failures(run.id)?;

    Ok(CrawlStatistics {
        run_id: run.id,
        start_url: run.start_url,
        status: run.status,
        duration_seconds,
        pages_downloaded: run.pages_downloaded,
        assets_downloaded: run.assets_downloaded,
        links_by_category,
        failures,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Run: #{} ({})", stats.run_id, stats.status.to_db_string());
    println!("  Start URL: {}", stats.start_url);
    if let Some(seconds) = stats.duration_seconds {
        println!("  Duration: {}s", seconds);
    }
    println!("  Pages downloaded: {}", stats.pages_downloaded);
    println!("  Assets downloaded: {}", stats.assets_downloaded);
    println!();

    println!("Links by Category:");
    let total_links: u64 = stats.links_by_category.values().sum();
    for category in [
        LinkCategory::Documentation,
        LinkCategory::Auxiliary,
        LinkCategory::External,
        LinkCategory::Asset,
    ] {
        let count = stats.links_by_category.get(&category).copied().unwrap_or(0);
        let percentage = if total_links > 0 {
            (count as f64 / total_links as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", category.as_str(), count, percentage);
    }
    println!();

    if !stats.failures.is_empty() {
        println!("Failures ({}):", stats.failures.len());
        for failure in &stats.failures {
            println!("  - {}: {}", failure.url, failure.reason);
        }
        println!();
    }

    let attempted = stats.pages_downloaded + stats.failures.len() as u64;
    let success_rate = if attempted > 0 {
        (stats.pages_downloaded as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages saved)",
        success_rate, stats.pages_downloaded, attempted
    );
}
