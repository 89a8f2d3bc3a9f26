//! Crawl session scheduling
//!
//! This module handles:
//! - Seeding the frontier and running a bounded pool of workers over it
//! - Content store lookups ahead of any network fetch
//! - Link discovery, origin filtering and depth bookkeeping
//! - The randomized delay between a worker's dispatches
//! - Draining in-flight work on limits, operator stops and fatal errors

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::{choose_method, FetchMethod, LightFetcher, PageFetcher};
use crate::crawler::frontier::{CrawlTarget, Frontier, FrontierStats, KeywordFilter};
use crate::crawler::keywords::KeywordSet;
use crate::crawler::parser::extract_links;
use crate::crawler::pipeline::{share_store, FetchPipeline, FetchStatus, SharedStore};
use crate::crawler::render::RenderedFetcher;
use crate::storage::{ContentStore, RunStatus};
use crate::template::{parse_document, ParsedDocument};
use crate::url::{normalize_url, OriginPolicy};
use crate::StencilError;
use futures::FutureExt;
use rand::Rng;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use url::Url;

/// How a crawl session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlStatus {
    /// The frontier ran dry
    CompletedNormally,
    /// max-pages was reached with targets still queued
    StoppedAtLimit,
    /// Stopped through a [`StopHandle`]
    Interrupted,
    /// A fatal error stopped the session; holds the first one
    Aborted(String),
}

impl CrawlStatus {
    /// The run status recorded in the content store
    pub fn run_status(&self) -> RunStatus {
        match self {
            CrawlStatus::CompletedNormally => RunStatus::Completed,
            CrawlStatus::StoppedAtLimit => RunStatus::StoppedAtLimit,
            CrawlStatus::Interrupted | CrawlStatus::Aborted(_) => RunStatus::Aborted,
        }
    }
}

/// Counters for one crawl session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Targets popped from the frontier, cache hits included
    pub dispatched: u32,
    pub cache_hits: u32,
    /// Pages fetched from the network
    pub fetched: u32,
    /// Of `fetched`, pages that needed the browser
    pub rendered: u32,
    /// Targets still behind a challenge after the last attempt
    pub challenged: u32,
    pub failed: u32,
    pub parse_errors: u32,
    /// Pages dropped from the synthesis input by the content keyword filter
    pub keyword_excluded: u32,
    pub frontier: FrontierStats,
}

/// Result of a crawl session
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub status: CrawlStatus,
    /// Parsed documents in dispatch order
    pub documents: Vec<ParsedDocument>,
    pub stats: CrawlStats,
    pub elapsed: Duration,
}

/// Requests an orderly stop of a running session
///
/// No new targets are dispatched after `stop`; fetches already in flight
/// finish and are kept.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Mutable state shared by the workers of a session
struct SessionState {
    frontier: Frontier,
    in_flight: usize,
    next_sequence: u64,
    documents: Vec<(u64, ParsedDocument)>,
    stats: CrawlStats,
    first_fatal: Option<String>,
}

/// What a worker should do next
enum Next {
    Fetch(CrawlTarget, u64),
    Wait,
    Done,
}

/// What processing one target produced
#[derive(Default)]
struct Processed {
    document: Option<ParsedDocument>,
    links: Vec<(CrawlTarget, String)>,
}

struct Session {
    config: CrawlerConfig,
    state: Mutex<SessionState>,
    stop: StopHandle,
    store: SharedStore,
    pipeline: FetchPipeline,
    policy: OriginPolicy,
    content_filter: Option<KeywordSet>,
}

impl Session {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next(&self) -> Next {
        let mut state = self.lock_state();

        if self.stop.is_stopped() && !state.frontier.is_stopped() {
            tracing::info!("Stop requested, draining {} in-flight targets", state.in_flight);
            state.frontier.stop();
        }

        match state.frontier.pop() {
            Some(target) => {
                state.in_flight += 1;
                state.stats.dispatched += 1;
                let sequence = state.next_sequence;
                state.next_sequence += 1;
                Next::Fetch(target, sequence)
            }
            None if state.in_flight == 0 => Next::Done,
            None => Next::Wait,
        }
    }

    /// Records a processed target and queues its links
    fn complete(&self, target: &CrawlTarget, sequence: u64, result: crate::Result<Processed>) {
        {
            let mut state = self.lock_state();
            state.in_flight -= 1;

            match result {
                Ok(processed) => {
                    if let Some(document) = processed.document {
                        state.documents.push((sequence, document));
                    }
                    for (link, anchor_text) in processed.links {
                        let outcome = state.frontier.push_link(link, &anchor_text);
                        tracing::trace!("Link from {}: {:?}", target.url, outcome);
                    }
                }
                Err(e) => {
                    tracing::error!("Fatal error while processing {}: {}", target.url, e);
                    if state.first_fatal.is_none() {
                        state.first_fatal = Some(e.to_string());
                    }
                    state.frontier.stop();
                }
            }
        }
        self.stop.wake.notify_waiters();
    }

    /// Resolves one target to a document and its outbound links
    ///
    /// Only content store failures are returned as errors; everything else
    /// is counted and logged.
    async fn process(&self, target: &CrawlTarget) -> crate::Result<Processed> {
        let cached = if self.config.no_cache {
            None
        } else {
            let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            store.get(&target.url)?
        };

        let (body, mime) = match cached {
            Some(page) => {
                tracing::debug!("Cache hit for {}", target.url);
                self.lock_state().stats.cache_hits += 1;
                (page.body, page.mime)
            }
            None => {
                let result = self
                    .pipeline
                    .fetch(&target.url, choose_method(&self.config, false))
                    .await?;

                match result.status {
                    FetchStatus::Success { body, mime } => {
                        let mut state = self.lock_state();
                        state.stats.fetched += 1;
                        if result.fetched_via == FetchMethod::Rendered {
                            state.stats.rendered += 1;
                        }
                        (body, mime)
                    }
                    FetchStatus::ChallengeDetected => {
                        tracing::warn!("{} is still behind a challenge, skipping", target.url);
                        self.lock_state().stats.challenged += 1;
                        return Ok(Processed::default());
                    }
                    FetchStatus::Failed { kind, attempts } => {
                        tracing::warn!(
                            "Failed to fetch {} ({} after {} attempts)",
                            target.url,
                            kind,
                            attempts
                        );
                        self.lock_state().stats.failed += 1;
                        return Ok(Processed::default());
                    }
                }
            }
        };

        let document = match parse_document(&body, &mime) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Excluding {} from synthesis: {}", target.url, e);
                self.lock_state().stats.parse_errors += 1;
                return Ok(Processed::default());
            }
        };

        let document = match &self.content_filter {
            Some(keywords) if !keywords.matches_content(&body) => {
                tracing::debug!("{} mentions no keyword, excluding from synthesis", target.url);
                self.lock_state().stats.keyword_excluded += 1;
                None
            }
            _ => Some(document),
        };

        Ok(Processed {
            document,
            links: self.discover_links(target, &body),
        })
    }

    fn discover_links(&self, target: &CrawlTarget, body: &str) -> Vec<(CrawlTarget, String)> {
        let base = match Url::parse(&target.url) {
            Ok(base) => base,
            Err(e) => {
                tracing::debug!("Cannot resolve links against {}: {}", target.url, e);
                return Vec::new();
            }
        };

        extract_links(body, &base)
            .into_iter()
            .filter_map(|link| {
                let normalized = match normalize_url(&link.url) {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::trace!("Dropping link {}: {}", link.url, e);
                        return None;
                    }
                };
                if !self.policy.allows(&normalized) {
                    tracing::trace!("Link {} is outside the crawl's domains", normalized);
                    return None;
                }
                Some((
                    CrawlTarget::new(normalized.to_string(), target.depth + 1),
                    link.anchor_text,
                ))
            })
            .collect()
    }

    /// Random pause between dispatches, if enabled
    fn dispatch_delay(&self) -> Option<Duration> {
        if self.config.no_delay {
            return None;
        }
        let [min, max] = self.config.delay_range_ms;
        let ms = rand::thread_rng().gen_range(min..=max.max(min));
        Some(Duration::from_millis(ms))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

async fn worker(session: Arc<Session>, id: u32) {
    tracing::debug!("Worker {} started", id);

    loop {
        // Registered before inspecting the state so no wakeup is missed
        let woken = session.stop.wake.notified();

        let (target, sequence) = match session.next() {
            Next::Fetch(target, sequence) => (target, sequence),
            Next::Wait => {
                woken.await;
                continue;
            }
            Next::Done => break,
        };

        tracing::debug!("Worker {} dispatching {} (depth {})", id, target.url, target.depth);
        // The target is released even when processing panics
        let result = AssertUnwindSafe(session.process(&target))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(StencilError::Worker(format!(
                    "panicked while processing {}: {}",
                    target.url,
                    panic_message(&*payload)
                )))
            });
        session.complete(&target, sequence, result);

        if let Some(delay) = session.dispatch_delay() {
            tracing::trace!("Worker {} pausing {:?}", id, delay);
            tokio::time::sleep(delay).await;
        }
    }

    session.stop.wake.notify_waiters();
    tracing::debug!("Worker {} finished", id);
}

/// Runs crawl sessions
///
/// # Example
///
/// ```no_run
/// use stencil::config::load_config;
/// use stencil::storage::open_store;
/// use stencil::Scheduler;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("stencil.toml"))?;
/// let store = open_store(&config.project.project_dir)?;
/// let outcome = Scheduler::new(&config, store)?.run().await?;
/// println!("{} documents collected", outcome.documents.len());
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    config: CrawlerConfig,
    start_url: Url,
    store: SharedStore,
    light: Arc<dyn PageFetcher>,
    rendered: Arc<dyn PageFetcher>,
    keyword_filter: KeywordFilter,
    content_filter: Option<KeywordSet>,
    config_hash: String,
    stop: StopHandle,
}

impl Scheduler {
    /// Creates a scheduler with the HTTP and browser fetchers
    ///
    /// Keywords are loaded from the configured keyword file: with
    /// `use-keywords` the file is required and non-matching links and pages
    /// are rejected; without it, an existing file only lowers the priority
    /// of non-matching links.
    pub fn new(config: &Config, store: impl ContentStore + 'static) -> crate::Result<Self> {
        let light = Arc::new(LightFetcher::new(&config.crawler)?);
        let rendered = Arc::new(RenderedFetcher::new(config.crawler.selenium_timeout()));
        let scheduler = Self::with_fetchers(config, share_store(store), light, rendered)?;

        let keyword_file = config.keyword_file_path();
        if config.crawler.use_keywords {
            let keywords = crate::config::load_keywords(&keyword_file)?;
            Ok(scheduler.with_keywords(keywords, true))
        } else if keyword_file.is_file() {
            let keywords = crate::config::load_keywords(&keyword_file)?;
            Ok(scheduler.with_keywords(keywords, false))
        } else {
            Ok(scheduler)
        }
    }

    /// Creates a scheduler over the given fetchers and shared store
    pub fn with_fetchers(
        config: &Config,
        store: SharedStore,
        light: Arc<dyn PageFetcher>,
        rendered: Arc<dyn PageFetcher>,
    ) -> crate::Result<Self> {
        let start_url = normalize_url(&config.project.start_url)?;

        Ok(Self {
            config: config.crawler.clone(),
            start_url,
            store,
            light,
            rendered,
            keyword_filter: KeywordFilter::Off,
            content_filter: None,
            config_hash: String::new(),
            stop: StopHandle::default(),
        })
    }

    /// Sets the keyword set
    ///
    /// # Arguments
    ///
    /// * `keywords` - Keywords to score links and pages against
    /// * `hard` - Reject non-matching links and pages instead of deprioritizing links
    pub fn with_keywords(mut self, keywords: Vec<String>, hard: bool) -> Self {
        let set = KeywordSet::new(keywords, self.config.keyword_threshold);
        if set.is_empty() {
            tracing::warn!("Keyword set is empty, keyword filtering disabled");
            return self;
        }

        tracing::info!(
            "Loaded {} keywords ({} filtering)",
            set.len(),
            if hard { "hard" } else { "soft" }
        );
        if hard {
            self.content_filter = Some(set.clone());
            self.keyword_filter = KeywordFilter::Hard(set);
        } else {
            self.keyword_filter = KeywordFilter::Soft(set);
        }
        self
    }

    /// Sets the configuration hash recorded with the run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Returns a handle that stops the session once it runs
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn start_url(&self) -> &Url {
        &self.start_url
    }

    /// Runs the crawl session to completion
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - The session ended; partial results are kept
    ///   even when it was aborted
    /// * `Err(StencilError)` - The run could not be recorded in the store
    pub async fn run(self) -> crate::Result<CrawlOutcome> {
        let started = Instant::now();

        let run_id = {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            if self.config.no_cache {
                let removed = store.clear()?;
                tracing::info!("Caching disabled, cleared {} cached pages", removed);
            }
            store.create_run(&self.config_hash)?
        };

        let mut frontier = Frontier::new(
            self.config.strategy,
            self.config.max_depth,
            self.config.max_pages,
            self.keyword_filter,
        );
        frontier.push(CrawlTarget::new(self.start_url.to_string(), 0));

        tracing::info!(
            "Starting crawl run {} at {} ({}, {} workers, max pages {}, max depth {})",
            run_id,
            self.start_url,
            self.config.strategy,
            self.config.max_workers,
            self.config.max_pages,
            self.config.max_depth
        );

        let pipeline = FetchPipeline::new(
            self.config.clone(),
            self.light,
            self.rendered,
            Arc::clone(&self.store),
        );
        let session = Arc::new(Session {
            policy: OriginPolicy::new(&self.start_url, &self.config),
            config: self.config,
            state: Mutex::new(SessionState {
                frontier,
                in_flight: 0,
                next_sequence: 0,
                documents: Vec::new(),
                stats: CrawlStats::default(),
                first_fatal: None,
            }),
            stop: self.stop,
            store: Arc::clone(&self.store),
            pipeline,
            content_filter: self.content_filter,
        });

        let workers: Vec<_> = (0..session.config.max_workers.max(1))
            .map(|id| tokio::spawn(worker(Arc::clone(&session), id)))
            .collect();

        for handle in futures::future::join_all(workers).await {
            if let Err(e) = handle {
                let error = StencilError::Worker(e.to_string());
                tracing::error!("{}", error);
                let mut state = session.lock_state();
                if state.first_fatal.is_none() {
                    state.first_fatal = Some(error.to_string());
                }
            }
        }

        let (status, documents, stats) = {
            let mut state = session.lock_state();
            let status = if let Some(error) = state.first_fatal.take() {
                CrawlStatus::Aborted(error)
            } else if session.stop.is_stopped() {
                CrawlStatus::Interrupted
            } else if state.frontier.limit_reached() && !state.frontier.is_empty() {
                CrawlStatus::StoppedAtLimit
            } else {
                CrawlStatus::CompletedNormally
            };

            let mut documents = std::mem::take(&mut state.documents);
            documents.sort_by_key(|(sequence, _)| *sequence);

            let mut stats = state.stats.clone();
            stats.frontier = state.frontier.stats();
            (status, documents.into_iter().map(|(_, d)| d).collect::<Vec<_>>(), stats)
        };

        {
            let mut store = session.store.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = store.finish_run(run_id, status.run_status()) {
                tracing::error!("Failed to record the end of run {}: {}", run_id, e);
            }
        }

        let elapsed = started.elapsed();
        tracing::info!(
            "Crawl run {} ended ({:?}): {} dispatched, {} documents collected in {:?}",
            run_id,
            status,
            stats.dispatched,
            documents.len(),
            elapsed
        );

        Ok(CrawlOutcome {
            status,
            documents,
            stats,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Limit, OutputConfig, ProjectConfig, Strategy};
    use crate::crawler::fetcher::{FetchAttempt, FetchError};
    use crate::storage::{CachedPage, RunRecord, SqliteStore, StorageError, StorageResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU32;

    /// Serves pages from a fixed site map
    struct Site {
        method: FetchMethod,
        pages: HashMap<String, FetchAttempt>,
        calls: Mutex<Vec<String>>,
        concurrent: AtomicU32,
        peak: AtomicU32,
    }

    impl Site {
        fn new(method: FetchMethod, pages: &[(&str, FetchAttempt)]) -> Arc<Self> {
            Arc::new(Self {
                method,
                pages: pages
                    .iter()
                    .map(|(url, attempt)| (url.to_string(), attempt.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                concurrent: AtomicU32::new(0),
                peak: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for Site {
        fn method(&self) -> FetchMethod {
            self.method
        }

        async fn fetch(&self, url: &str) -> FetchAttempt {
            self.calls.lock().unwrap().push(url.to_string());
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            self.pages
                .get(url)
                .cloned()
                .unwrap_or_else(|| FetchAttempt::Error(FetchError::permanent("HTTP 404")))
        }
    }

    /// Panics when asked for one URL, serves the site otherwise
    struct Panicking {
        site: Arc<Site>,
        url: &'static str,
    }

    #[async_trait]
    impl PageFetcher for Panicking {
        fn method(&self) -> FetchMethod {
            FetchMethod::Light
        }

        async fn fetch(&self, url: &str) -> FetchAttempt {
            if url == self.url {
                panic!("fetcher exploded on {}", url);
            }
            self.site.fetch(url).await
        }
    }

    /// Holds one URL's fetch until released
    struct Gated {
        site: Arc<Site>,
        url: &'static str,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl PageFetcher for Gated {
        fn method(&self) -> FetchMethod {
            FetchMethod::Light
        }

        async fn fetch(&self, url: &str) -> FetchAttempt {
            if url == self.url {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.site.fetch(url).await
        }
    }

    /// In-memory store whose writes fail for one URL
    struct FailingStore {
        inner: SqliteStore,
        fail_on: &'static str,
    }

    impl ContentStore for FailingStore {
        fn get(&self, url: &str) -> StorageResult<Option<CachedPage>> {
            self.inner.get(url)
        }

        fn put(&mut self, page: &CachedPage) -> StorageResult<()> {
            if page.url == self.fail_on {
                return Err(StorageError::Database("disk full".to_string()));
            }
            self.inner.put(page)
        }

        fn clear(&mut self) -> StorageResult<u64> {
            self.inner.clear()
        }

        fn count(&self) -> StorageResult<u64> {
            self.inner.count()
        }

        fn count_by_method(&self, method: FetchMethod) -> StorageResult<u64> {
            self.inner.count_by_method(method)
        }

        fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
            self.inner.create_run(config_hash)
        }

        fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
            self.inner.finish_run(run_id, status)
        }

        fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
            self.inner.recent_runs(limit)
        }
    }

    fn html(body: &str) -> FetchAttempt {
        FetchAttempt::Content {
            body: format!("<html><body>{}</body></html>", body),
            mime: "text/html".to_string(),
        }
    }

    fn config(strategy: Strategy, workers: u32) -> Config {
        Config {
            crawler: CrawlerConfig {
                strategy,
                max_workers: workers,
                no_delay: true,
                retry_count: 0,
                retry_base_delay_ms: 1,
                ..CrawlerConfig::default()
            },
            project: ProjectConfig {
                start_url: "https://site.test/".to_string(),
                project_dir: std::env::temp_dir(),
            },
            output: OutputConfig::default(),
        }
    }

    fn site_map() -> Vec<(&'static str, FetchAttempt)> {
        vec![
            (
                "https://site.test/",
                html(r#"<a href="/a">A</a><a href="/b">B</a><a href="https://elsewhere.test/">X</a>"#),
            ),
            ("https://site.test/a", html(r#"<a href="/a/1">1</a><a href="/">home</a>"#)),
            ("https://site.test/b", html(r#"<a href="/b/1">1</a>"#)),
            ("https://site.test/a/1", html("<p>leaf</p>")),
            ("https://site.test/b/1", html("<p>leaf</p>")),
        ]
    }

    fn scheduler(config: &Config, light: Arc<Site>) -> Scheduler {
        let store = share_store(SqliteStore::new_in_memory().unwrap());
        let rendered = Site::new(FetchMethod::Rendered, &[]);
        Scheduler::with_fetchers(config, store, light, rendered).unwrap()
    }

    #[tokio::test]
    async fn test_bfs_visits_each_page_once() {
        let light = Site::new(FetchMethod::Light, &site_map());
        let outcome = scheduler(&config(Strategy::Bfs, 1), light.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.status, CrawlStatus::CompletedNormally);
        assert_eq!(
            light.calls(),
            vec![
                "https://site.test/",
                "https://site.test/a",
                "https://site.test/b",
                "https://site.test/a/1",
                "https://site.test/b/1",
            ]
        );
        assert_eq!(outcome.documents.len(), 5);
        assert_eq!(outcome.stats.dispatched, 5);
        assert!(outcome.stats.frontier.duplicates >= 1);
    }

    #[tokio::test]
    async fn test_dfs_exhausts_branch_first() {
        let light = Site::new(FetchMethod::Light, &site_map());
        scheduler(&config(Strategy::Dfs, 1), light.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(
            light.calls(),
            vec![
                "https://site.test/",
                "https://site.test/b",
                "https://site.test/b/1",
                "https://site.test/a",
                "https://site.test/a/1",
            ]
        );
    }

    #[tokio::test]
    async fn test_page_limit_stops_dispatch() {
        let mut config = config(Strategy::Bfs, 1);
        config.crawler.max_pages = Limit::Finite(2);
        let light = Site::new(FetchMethod::Light, &site_map());

        let outcome = scheduler(&config, light.clone()).run().await.unwrap();
        assert_eq!(outcome.status, CrawlStatus::StoppedAtLimit);
        assert_eq!(light.calls().len(), 2);
        assert_eq!(outcome.documents.len(), 2);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let mut config = config(Strategy::Bfs, 2);
        config.crawler.max_depth = Limit::Finite(1);
        let light = Site::new(FetchMethod::Light, &site_map());

        let outcome = scheduler(&config, light.clone()).run().await.unwrap();
        assert_eq!(outcome.status, CrawlStatus::CompletedNormally);
        assert_eq!(light.calls().len(), 3);
        assert_eq!(outcome.stats.frontier.depth_rejected, 2);
    }

    #[tokio::test]
    async fn test_worker_pool_is_bounded() {
        let urls: Vec<String> = (0..10).map(|i| format!("https://site.test/p{}", i)).collect();
        let mut pages = vec![(
            "https://site.test/",
            html(
                &(0..10)
                    .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
                    .collect::<String>(),
            ),
        )];
        for url in &urls {
            pages.push((url.as_str(), html("<p>x</p>")));
        }
        let light = Site::new(FetchMethod::Light, &pages);

        let outcome = scheduler(&config(Strategy::Bfs, 3), light.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(outcome.documents.len(), 11);
        assert!(light.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let config = config(Strategy::Bfs, 1);
        let mut store = SqliteStore::new_in_memory().unwrap();
        store
            .put(&CachedPage::new(
                "https://site.test/",
                "<html><body><p>cached</p></body></html>",
                "text/html",
                FetchMethod::Light,
            ))
            .unwrap();

        let light = Site::new(FetchMethod::Light, &site_map());
        let rendered = Site::new(FetchMethod::Rendered, &[]);
        let outcome = Scheduler::with_fetchers(&config, share_store(store), light.clone(), rendered)
            .unwrap()
            .run()
            .await
            .unwrap();

        assert!(light.calls().is_empty());
        assert_eq!(outcome.stats.cache_hits, 1);
        assert_eq!(outcome.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_run_dispatches_nothing() {
        let light = Site::new(FetchMethod::Light, &site_map());
        let scheduler = scheduler(&config(Strategy::Bfs, 2), light.clone());
        scheduler.stop_handle().stop();

        let outcome = scheduler.run().await.unwrap();
        assert_eq!(outcome.status, CrawlStatus::Interrupted);
        assert!(light.calls().is_empty());
    }

    #[tokio::test]
    async fn test_hard_keywords_filter_links_and_documents() {
        let pages = vec![
            (
                "https://site.test/",
                html(r#"<a href="/shoes">Shoes</a><a href="/about">About</a>"#),
            ),
            ("https://site.test/shoes", html("<p>Red shoes</p>")),
            ("https://site.test/about", html("<p>About us</p>")),
        ];
        let light = Site::new(FetchMethod::Light, &pages);
        let outcome = scheduler(&config(Strategy::Bfs, 1), light.clone())
            .with_keywords(vec!["shoes".to_string()], true)
            .run()
            .await
            .unwrap();

        assert_eq!(light.calls(), vec!["https://site.test/", "https://site.test/shoes"]);
        assert_eq!(outcome.stats.frontier.keyword_rejected, 1);
        assert_eq!(outcome.documents.len(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_pages_are_excluded() {
        let pages = vec![
            (
                "https://site.test/",
                html(r#"<a href="/data">data</a><a href="/deep">deep</a>"#),
            ),
            (
                "https://site.test/data",
                FetchAttempt::Content {
                    body: r#"{"items": []}"#.to_string(),
                    mime: "application/json".to_string(),
                },
            ),
            (
                "https://site.test/deep",
                html(&format!("{}x{}", "<div>".repeat(8000), "</div>".repeat(8000))),
            ),
        ];
        let light = Site::new(FetchMethod::Light, &pages);
        let outcome = scheduler(&config(Strategy::Bfs, 1), light).run().await.unwrap();

        assert_eq!(outcome.status, CrawlStatus::CompletedNormally);
        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.stats.parse_errors, 2);
    }

    #[tokio::test]
    async fn test_panicking_fetch_aborts_without_hanging() {
        let fetcher = Arc::new(Panicking {
            site: Site::new(FetchMethod::Light, &site_map()),
            url: "https://site.test/a",
        });
        let store = share_store(SqliteStore::new_in_memory().unwrap());
        let rendered = Site::new(FetchMethod::Rendered, &[]);
        let scheduler =
            Scheduler::with_fetchers(&config(Strategy::Bfs, 2), store, fetcher, rendered).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), scheduler.run())
            .await
            .expect("crawl hung after a panic")
            .unwrap();

        match &outcome.status {
            CrawlStatus::Aborted(error) => {
                assert!(error.contains("https://site.test/a"), "{}", error);
                assert!(error.contains("fetcher exploded"), "{}", error);
            }
            other => panic!("expected an aborted crawl, got {:?}", other),
        }
        assert!(!outcome.documents.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_aborts_and_keeps_documents() {
        let light = Site::new(FetchMethod::Light, &site_map());
        let store = share_store(FailingStore {
            inner: SqliteStore::new_in_memory().unwrap(),
            fail_on: "https://site.test/b",
        });
        let rendered = Site::new(FetchMethod::Rendered, &[]);
        let outcome = Scheduler::with_fetchers(
            &config(Strategy::Bfs, 1),
            store.clone(),
            light.clone(),
            rendered,
        )
        .unwrap()
        .run()
        .await
        .unwrap();

        match &outcome.status {
            CrawlStatus::Aborted(error) => assert!(error.contains("disk full"), "{}", error),
            other => panic!("expected an aborted crawl, got {:?}", other),
        }
        // Nothing is dispatched after the failed write
        assert_eq!(
            light.calls(),
            vec!["https://site.test/", "https://site.test/a", "https://site.test/b"]
        );
        assert_eq!(outcome.documents.len(), 2);

        let store = store.lock().unwrap();
        assert_eq!(store.count().unwrap(), 2);
        let runs = store.recent_runs(1).unwrap();
        assert_eq!(runs[0].status, RunStatus::Aborted);
    }

    #[tokio::test]
    async fn test_stop_mid_crawl_drains_in_flight_pages() {
        let gate = Arc::new(Gated {
            site: Site::new(FetchMethod::Light, &site_map()),
            url: "https://site.test/a",
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let store = share_store(SqliteStore::new_in_memory().unwrap());
        let rendered = Site::new(FetchMethod::Rendered, &[]);
        let scheduler = Scheduler::with_fetchers(
            &config(Strategy::Bfs, 1),
            store,
            gate.clone(),
            rendered,
        )
        .unwrap();

        let stop = scheduler.stop_handle();
        let operator = async {
            gate.entered.notified().await;
            stop.stop();
            gate.release.notify_one();
        };
        let (outcome, ()) = tokio::join!(scheduler.run(), operator);
        let outcome = outcome.unwrap();

        assert_eq!(outcome.status, CrawlStatus::Interrupted);
        // The page in flight at the stop is finished and kept; nothing new starts
        assert_eq!(
            gate.site.calls(),
            vec!["https://site.test/", "https://site.test/a"]
        );
        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.stats.dispatched, 2);
    }
}
