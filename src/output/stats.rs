//! Statistics from the content store and from crawl sessions
//!
//! This module provides functionality for extracting and displaying
//! cache and run statistics.

use crate::crawler::{CrawlOutcome, FetchMethod};
use crate::storage::{ContentStore, RunRecord, StorageResult};

/// Runs listed by `--stats`
const RECENT_RUNS: usize = 5;

/// Content store statistics
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Total number of cached pages
    pub total_pages: u64,

    /// Pages cached from a plain HTTP fetch
    pub light_pages: u64,

    /// Pages cached from a browser render
    pub rendered_pages: u64,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from the content store
///
/// # Arguments
///
/// * `store` - The store to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query the store
pub fn load_statistics(store: &dyn ContentStore) -> StorageResult<StoreStatistics> {
    Ok(StoreStatistics {
        total_pages: store.count()?,
        light_pages: store.count_by_method(FetchMethod::Light)?,
        rendered_pages: store.count_by_method(FetchMethod::Rendered)?,
        recent_runs: store.recent_runs(RECENT_RUNS)?,
    })
}

/// Prints store statistics to stdout
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Cache Statistics ===\n");

    println!("Cached pages: {}", stats.total_pages);
    for (method, count) in [
        (FetchMethod::Light, stats.light_pages),
        (FetchMethod::Rendered, stats.rendered_pages),
    ] {
        let percentage = if stats.total_pages > 0 {
            (count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", method, count, percentage);
    }
    println!();

    if stats.recent_runs.is_empty() {
        println!("No runs recorded.");
        return;
    }

    println!("Recent runs:");
    for run in &stats.recent_runs {
        println!(
            "  #{} {} -> {} [{}] config {}",
            run.id,
            run.started_at,
            run.finished_at.as_deref().unwrap_or("(unfinished)"),
            run.status.to_db_string(),
            short_hash(&run.config_hash)
        );
    }
}

/// Prints the counters of a finished crawl session to stdout
pub fn print_crawl_report(outcome: &CrawlOutcome) {
    let stats = &outcome.stats;

    println!("=== Crawl Report ===\n");
    println!("Status: {:?}", outcome.status);
    println!("Elapsed: {:.1}s", outcome.elapsed.as_secs_f64());
    println!();
    println!("Dispatched: {}", stats.dispatched);
    println!("  cache hits: {}", stats.cache_hits);
    println!("  fetched: {} ({} rendered)", stats.fetched, stats.rendered);
    println!("  failed: {}", stats.failed);
    println!("  still challenged: {}", stats.challenged);
    println!("Documents collected: {}", outcome.documents.len());
    println!("  unparseable: {}", stats.parse_errors);
    println!("  excluded by keywords: {}", stats.keyword_excluded);
    println!();
    println!("Frontier:");
    println!("  queued: {}", stats.frontier.queued);
    println!("  duplicates: {}", stats.frontier.duplicates);
    println!("  beyond max depth: {}", stats.frontier.depth_rejected);
    println!("  rejected by keywords: {}", stats.frontier.keyword_rejected);
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CachedPage, RunStatus, SqliteStore};

    #[test]
    fn test_load_statistics() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        for (url, method) in [
            ("https://example.com/a", FetchMethod::Light),
            ("https://example.com/b", FetchMethod::Light),
            ("https://example.com/c", FetchMethod::Rendered),
        ] {
            store
                .put(&CachedPage::new(url, "<html></html>", "text/html", method))
                .unwrap();
        }
        let run = store.create_run("abc123").unwrap();
        store.finish_run(run, RunStatus::Completed).unwrap();

        let stats = load_statistics(&store).unwrap();
        assert_eq!(stats.total_pages, 3);
        assert_eq!(stats.light_pages, 2);
        assert_eq!(stats.rendered_pages, 1);
        assert_eq!(stats.recent_runs.len(), 1);
        assert_eq!(stats.recent_runs[0].status, RunStatus::Completed);
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_hash("abc"), "abc");
    }
}
