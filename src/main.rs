//! doc-scribe main entry point
//!
//! This is the command-line interface for the doc-scribe documentation crawler.

use anyhow::{bail, Context};
use clap::Parser;
use doc_scribe::config::{hash_config_source, load_config_with_hash, validate, Config, FetchBackendKind, OutputFormat};
use doc_scribe::crawler::{channel, run_crawl, AuxiliaryRequest, CrawlEvent, CrawlReport, ProgressKind};
use doc_scribe::output::{load_statistics, print_statistics, write_index};
use doc_scribe::storage::open_storage;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Number of auxiliary links listed before asking for confirmation
const PROMPT_PREVIEW: usize = 20;

/// doc-scribe: a documentation site crawler
///
/// doc-scribe crawls a documentation site breadth-first, converts every
/// documentation page to the chosen format and records the run in a SQLite
/// manifest next to the output.
#[derive(Parser, Debug)]
#[command(name = "doc-scribe")]
#[command(version)]
#[command(about = "Crawl a documentation site and save it locally", long_about = None)]
struct Cli {
    /// Start URL (overrides the configuration file)
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum link depth from the start URL
    #[arg(short = 'd', long)]
    depth: Option<u32>,

    /// Stop after saving this many pages
    #[arg(short = 'm', long)]
    max_pages: Option<usize>,

    /// Maximum concurrent fetches
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Render pages in headless Chromium
    #[arg(long)]
    browser: bool,

    /// Download images, stylesheets, scripts and fonts
    #[arg(long)]
    assets: bool,

    /// Ask before crawling auxiliary (non-documentation) pages
    #[arg(short, long)]
    interactive: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the configuration, print it and exit
    #[arg(long, conflicts_with_all = ["stats", "rebuild_index"])]
    dry_run: bool,

    /// Show statistics of the last run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "rebuild_index"])]
    stats: bool,

    /// Regenerate _index.md from the manifest and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    rebuild_index: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = resolve_config(&cli)?;

    if cli.stats {
        handle_stats(&config)
    } else if cli.rebuild_index {
        handle_rebuild_index(&config)
    } else {
        validate(&config).context("Invalid configuration")?;
        if cli.dry_run {
            handle_dry_run(&config, &config_hash);
            Ok(())
        } else {
            handle_crawl(config, config_hash, cli.quiet).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("doc_scribe=info,warn"),
            1 => EnvFilter::new("doc_scribe=debug,info"),
            2 => EnvFilter::new("doc_scribe=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file (if any) and applies command-line overrides
///
/// Without a file the hash covers the resolved settings instead.
fn resolve_config(cli: &Cli) -> anyhow::Result<(Config, String)> {
    let (mut config, file_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            (config, Some(hash))
        }
        None => match &cli.url {
            Some(url) => (Config::for_url(url), None),
            None if cli.stats || cli.rebuild_index => (Config::default(), None),
            None => bail!("a start URL or --config file is required"),
        },
    };

    if let Some(url) = &cli.url {
        config.crawler.start_url = url.clone();
    }
    if let Some(depth) = cli.depth {
        config.crawler.max_depth = depth;
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = Some(max_pages);
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency = concurrency;
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if let Some(dir) = &cli.output {
        config.output.directory = dir.clone();
    }
    if cli.browser {
        config.crawler.fetch_backend = FetchBackendKind::Browser;
    }
    if cli.assets {
        config.crawler.include_assets = true;
    }
    if cli.interactive {
        config.crawler.interactive = true;
    }

    let hash = file_hash.unwrap_or_else(|| hash_config_source(&format!("{:?}", config)));
    tracing::debug!("Configuration hash: {}", hash);
    Ok((config, hash))
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config, config_hash: &str) {
    println!("=== doc-scribe Dry Run ===\n");

    println!("Crawler Configuration:");
    for url in config.start_urls() {
        println!("  Start URL: {}", url);
    }
    println!("  Max depth: {}", config.crawler.max_depth);
    match config.crawler.max_pages {
        Some(cap) => println!("  Max pages: {}", cap),
        None => println!("  Max pages: unlimited"),
    }
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Delay between batches: {}ms", config.crawler.delay_ms);
    println!("  Timeout: {}s", config.crawler.timeout_secs);
    println!(
        "  Retries: {} (backoff {}ms..{}ms)",
        config.crawler.retries, config.crawler.backoff_base_ms, config.crawler.backoff_max_ms
    );
    println!("  Classification: {:?}", config.crawler.classification);
    println!("  Fetch backend: {:?}", config.crawler.fetch_backend);
    println!("  Assets: {}", config.crawler.include_assets);
    println!("  Interactive: {}", config.crawler.interactive);

    let filters = &config.filters;
    println!("\nFilters:");
    println!("  URL include: {:?}", filters.url_include);
    println!("  URL exclude: {:?}", filters.url_exclude);
    println!("  Content include: {:?}", filters.content_include);
    println!("  Content exclude: {:?}", filters.content_exclude);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory.display());
    println!("  Format: {}", config.output.format.as_str());
    println!("  Database: {}", config.output.resolved_database_path().display());

    println!("\n✓ Configuration is valid (hash: {})", config_hash);
}

/// Handles the --stats mode: shows statistics from the manifest
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = config.output.resolved_database_path();
    println!("Database: {}\n", path.display());

    let storage = open_storage(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --rebuild-index mode
fn handle_rebuild_index(config: &Config) -> anyhow::Result<()> {
    let path = config.output.resolved_database_path();
    let storage = open_storage(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let index = write_index(&storage, &config.output.directory)?;

    println!("✓ Index written to: {}", index.display());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, quiet: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight fetches");
            interrupt.cancel();
        }
    });

    let (events, rx) = channel();
    let printer = tokio::spawn(print_events(rx, quiet, cancel.clone()));

    let report = run_crawl(&config, &config_hash, cancel, events)
        .await
        .context("Crawl failed")?;

    if report.cancelled {
        // A prompt may still be blocked on stdin
        printer.abort();
    } else {
        // The coordinator's sink is gone, so the printer drains and stops
        let _ = printer.await;
    }

    if !quiet {
        print_report(&report, &config);
    }

    if report.cancelled {
        // Runtime shutdown would wait for the blocked stdin read
        std::process::exit(130);
    }
    Ok(())
}

async fn print_events(mut rx: UnboundedReceiver<CrawlEvent>, quiet: bool, cancel: CancellationToken) {
    while let Some(event) = rx.recv().await {
        match event {
            CrawlEvent::AuxiliaryConfirmation(request) => confirm_auxiliary(request, &cancel).await,
            CrawlEvent::Progress(progress) if !quiet && progress.kind == ProgressKind::Asset => {
                tracing::debug!("Asset {} saved ({})", progress.url, progress.current);
            }
            CrawlEvent::LinksDiscovered(links) => {
                tracing::debug!(
                    "New links: {} doc, {} aux, {} external, {} asset",
                    links.documentation.len(),
                    links.auxiliary.len(),
                    links.external.len(),
                    links.assets.len()
                );
            }
            _ => {}
        }
    }
}

/// Asks on stdin whether to crawl the auxiliary links
async fn confirm_auxiliary(request: AuxiliaryRequest, cancel: &CancellationToken) {
    println!("\nFound {} auxiliary (non-documentation) links:", request.links.len());
    for link in request.links.iter().take(PROMPT_PREVIEW) {
        println!("  - {}", link);
    }
    if request.links.len() > PROMPT_PREVIEW {
        println!("  ... and {} more", request.links.len() - PROMPT_PREVIEW);
    }

    let answer = ask(
        || {
            print!("Crawl them too? [y/N] ");
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
                Err(_) => false,
            }
        },
        cancel,
    )
    .await;

    request.respond(answer);
}

/// Runs a blocking prompt, answering "no" as soon as `cancel` fires
async fn ask<F>(prompt: F, cancel: &CancellationToken) -> bool
where
    F: FnOnce() -> bool + Send + 'static,
{
    let prompt = tokio::task::spawn_blocking(prompt);
    tokio::select! {
        _ = cancel.cancelled() => false,
        answer = prompt => answer.unwrap_or(false),
    }
}

fn print_report(report: &CrawlReport, config: &Config) {
    println!("\n=== Crawl {} ===\n", if report.cancelled { "Cancelled" } else { "Complete" });
    println!("  Pages saved: {}", report.pages_downloaded);
    if config.crawler.include_assets {
        println!("  Assets saved: {}", report.assets_downloaded);
    }
    println!(
        "  Links: {} doc, {} aux, {} external, {} asset",
        report.doc_links.len(),
        report.aux_links.len(),
        report.external_links.len(),
        report.asset_links.len()
    );

    if !report.failed.is_empty() {
        println!("\nFailures ({}):", report.failed.len());
        for (url, reason) in &report.failed {
            println!("  - {}: {}", url, reason);
        }
    }

    println!("\n✓ Output written to: {}", config.output.directory.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_prompt_answer_is_used() {
        assert!(ask(|| true, &CancellationToken::new()).await);
        assert!(!ask(|| false, &CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_cancel_does_not_wait_for_prompt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let answer = ask(
            || {
                std::thread::sleep(Duration::from_secs(2));
                true
            },
            &cancel,
        )
        .await;

        assert!(!answer);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
