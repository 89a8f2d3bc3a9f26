//! Stencil main entry point
//!
//! This is the command-line interface for the Stencil template synthesizer.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use stencil::config::{load_config_with_hash, Config};
use stencil::crawler::{CrawlStatus, RenderedFetcher, Scheduler};
use stencil::output::{
    artifact_paths, generate_markdown_summary, load_statistics, load_template,
    print_crawl_report, print_statistics, write_artifacts,
};
use stencil::storage::open_store;
use stencil::template::reuse_or_synthesize;
use tracing_subscriber::EnvFilter;

/// Stencil: crawl a site and synthesize an extraction template
///
/// Stencil crawls pages of a site, falling back to a headless browser for
/// challenge-protected pages, caches everything it fetched, and aligns the
/// collected pages to find the structure they share and the fields that vary.
#[derive(Parser, Debug)]
#[command(name = "stencil")]
#[command(version)]
#[command(about = "Crawls a site and synthesizes a structural extraction template", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Clear the page cache and fetch everything again
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show cache statistics and recent runs, then exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Regenerate the markdown summary from the existing template and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.fresh {
        config.crawler.no_cache = true;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.export_summary {
        handle_export_summary(&config)
    } else {
        handle_crawl(config, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("stencil=info,warn"),
            1 => EnvFilter::new("stencil=debug,info"),
            2 => EnvFilter::new("stencil=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;

    println!("=== Stencil Dry Run ===\n");

    println!("Start URL: {}", config.project.start_url);
    println!("Project directory: {}", config.project.project_dir.display());

    println!("\nCrawler Configuration:");
    println!("  Strategy: {}", crawler.strategy);
    println!("  Max pages: {}", crawler.max_pages);
    println!("  Max depth: {}", crawler.max_depth);
    println!("  Workers: {}", crawler.max_workers);
    if crawler.no_delay {
        println!("  Dispatch delay: off");
    } else {
        println!(
            "  Dispatch delay: {}-{}ms",
            crawler.delay_range_ms[0], crawler.delay_range_ms[1]
        );
    }
    println!(
        "  Retries: {} (base delay {}ms)",
        crawler.retry_count, crawler.retry_base_delay_ms
    );
    println!(
        "  Timeouts: {}s light, {}s rendered",
        crawler.page_timeout, crawler.selenium_timeout
    );
    println!(
        "  Fetch: {}{}",
        if crawler.selenium_only {
            "rendered only"
        } else {
            "light, rendered on challenge"
        },
        if RenderedFetcher::is_available() {
            ""
        } else {
            " (browser support not built)"
        }
    );
    println!("  Cache: {}", if crawler.no_cache { "off" } else { "on" });

    println!("\nLink Policy:");
    println!("  Restrict to origin: {}", crawler.restrict_to_origin);
    for pattern in &crawler.allowed_domains {
        println!("  Allowed: {}", pattern);
    }
    let keyword_file = config.keyword_file_path();
    if crawler.use_keywords {
        println!("  Keywords (required): {}", keyword_file.display());
    } else if keyword_file.is_file() {
        println!("  Keywords (priority only): {}", keyword_file.display());
    }

    println!("\nOutput:");
    println!("  Template: {}", config.output.template_path.display());
    println!("  Summary: {}", config.output.summary_path.display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows cache statistics
fn handle_stats(config: &Config) -> Result<()> {
    let store = open_store(&config.project.project_dir).context("Failed to open the page cache")?;
    let stats = load_statistics(&store).context("Failed to read cache statistics")?;

    println!("Project: {}\n", config.project.project_dir.display());
    print_statistics(&stats);
    Ok(())
}

/// Handles the --export-summary mode: rewrites the markdown from the JSON template
fn handle_export_summary(config: &Config) -> Result<()> {
    let paths = artifact_paths(config);

    let descriptor = load_template(&paths.template)
        .with_context(|| format!("Failed to read {}", paths.template.display()))?
        .with_context(|| format!("No template at {}", paths.template.display()))?;

    generate_markdown_summary(&descriptor, None, &paths.summary)?;
    println!("✓ Summary exported to: {}", paths.summary.display());
    Ok(())
}

/// Handles the main crawl-and-synthesize operation
async fn handle_crawl(config: Config, config_hash: String) -> Result<()> {
    let store = open_store(&config.project.project_dir).context("Failed to open the page cache")?;
    let scheduler = Scheduler::new(&config, store)?.with_config_hash(config_hash);

    let stop = scheduler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            stop.stop();
        }
    });

    let outcome = scheduler.run().await?;
    if let CrawlStatus::Aborted(error) = &outcome.status {
        tracing::error!("Crawl aborted: {}", error);
    }
    print_crawl_report(&outcome);

    let previous = if config.crawler.no_cache {
        None
    } else {
        let path = artifact_paths(&config).template;
        load_template(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring previous template at {}: {}", path.display(), e);
            None
        })
    };

    tracing::info!("Synthesizing template from {} documents", outcome.documents.len());
    let descriptor =
        reuse_or_synthesize(&outcome.documents, previous).context("Template synthesis failed")?;
    let artifacts = write_artifacts(&config, &descriptor, Some(&outcome))?;

    println!();
    println!(
        "✓ Template with {} fields written to {}",
        descriptor.fields.len(),
        artifacts.template.display()
    );
    println!("✓ Summary written to {}", artifacts.summary.display());
    Ok(())
}
