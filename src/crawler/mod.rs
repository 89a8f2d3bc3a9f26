//! Crawler module for page fetching and crawl scheduling
//!
//! This module contains the core crawling logic, including:
//! - The frontier with dedupe, depth and keyword handling
//! - Light and rendered fetchers with challenge detection
//! - The fetch pipeline with retry, backoff and caching
//! - Link extraction
//! - The worker-pool scheduler that drives a crawl session

mod challenge;
mod fetcher;
mod frontier;
mod keywords;
mod parser;
mod pipeline;
mod render;
mod scheduler;

pub use challenge::{body_is_challenge, detect as detect_challenge, headers_indicate_challenge};
pub use fetcher::{
    build_http_client, choose_method, classify_status, FetchAttempt, FetchError, FetchErrorKind,
    FetchMethod, LightFetcher, PageFetcher, BROWSER_USER_AGENT,
};
pub use frontier::{
    CrawlTarget, Frontier, FrontierStats, KeywordFilter, PushOutcome, DEFAULT_PRIORITY,
    LOW_PRIORITY,
};
pub use keywords::KeywordSet;
pub use parser::{extract_links, DiscoveredLink};
pub use pipeline::{backoff_delay, share_store, FetchPipeline, FetchResult, FetchStatus, SharedStore};
pub use render::RenderedFetcher;
pub use scheduler::{CrawlOutcome, CrawlStats, CrawlStatus, Scheduler, StopHandle};
