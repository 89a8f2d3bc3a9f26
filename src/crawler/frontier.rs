//! The crawl frontier
//!
//! Holds the targets still to visit together with the set of every URL ever
//! admitted, so a URL is dispatched at most once per session regardless of
//! how many pages link to it.

use crate::config::{Limit, Strategy};
use crate::crawler::keywords::KeywordSet;
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Priority of seeds, keyword matches and unfiltered links
pub const DEFAULT_PRIORITY: u32 = 0;

/// Priority of links that fell below the keyword threshold in soft mode
pub const LOW_PRIORITY: u32 = 100;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// Normalized URL
    pub url: String,

    /// Link distance from the start URL
    pub depth: u32,

    /// Priority value (lower is dispatched first)
    pub priority: u32,
}

impl CrawlTarget {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// What happened to a pushed target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    Duplicate,
    DepthExceeded,
    KeywordRejected,
}

/// How discovered links are weighed against the keyword set
#[derive(Debug, Clone, Default)]
pub enum KeywordFilter {
    #[default]
    Off,
    /// Non-matching links are kept at lowest priority
    Soft(KeywordSet),
    /// Non-matching links are rejected
    Hard(KeywordSet),
}

/// Counters kept for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub queued: u64,
    pub duplicates: u64,
    pub depth_rejected: u64,
    pub keyword_rejected: u64,
    pub dispatched: u32,
}

/// Pending targets ordered by priority, then by the crawl strategy
pub struct Frontier {
    strategy: Strategy,
    max_depth: Limit,
    max_pages: Limit,
    filter: KeywordFilter,
    queues: BTreeMap<u32, VecDeque<CrawlTarget>>,
    seen: HashSet<String>,
    len: usize,
    stopped: bool,
    stats: FrontierStats,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `strategy` - BFS pops the oldest target, DFS the newest
    /// * `max_depth` - Targets deeper than this are rejected at push
    /// * `max_pages` - `pop` returns `None` once this many targets were dispatched
    /// * `filter` - Keyword weighting applied by `push_link`
    pub fn new(
        strategy: Strategy,
        max_depth: Limit,
        max_pages: Limit,
        filter: KeywordFilter,
    ) -> Self {
        Self {
            strategy,
            max_depth,
            max_pages,
            filter,
            queues: BTreeMap::new(),
            seen: HashSet::new(),
            len: 0,
            stopped: false,
            stats: FrontierStats::default(),
        }
    }

    /// Pushes a target as is, bypassing the keyword filter
    pub fn push(&mut self, target: CrawlTarget) -> PushOutcome {
        self.admit(target, None)
    }

    /// Pushes a discovered link, letting the keyword filter set its priority
    /// or reject it
    pub fn push_link(&mut self, target: CrawlTarget, anchor_text: &str) -> PushOutcome {
        self.admit(target, Some(anchor_text))
    }

    fn admit(&mut self, mut target: CrawlTarget, anchor_text: Option<&str>) -> PushOutcome {
        if self.seen.contains(&target.url) {
            self.stats.duplicates += 1;
            return PushOutcome::Duplicate;
        }

        if self.max_depth.exceeded_by(target.depth) {
            self.stats.depth_rejected += 1;
            tracing::trace!(
                "Rejected {} at depth {} (max {})",
                target.url,
                target.depth,
                self.max_depth
            );
            return PushOutcome::DepthExceeded;
        }

        if let Some(anchor) = anchor_text {
            match &self.filter {
                KeywordFilter::Off => {}
                KeywordFilter::Soft(keywords) => {
                    target.priority = if keywords.matches_link(&target.url, anchor) {
                        DEFAULT_PRIORITY
                    } else {
                        LOW_PRIORITY
                    };
                }
                KeywordFilter::Hard(keywords) => {
                    if !keywords.matches_link(&target.url, anchor) {
                        self.stats.keyword_rejected += 1;
                        tracing::trace!("Rejected {}: no keyword match", target.url);
                        return PushOutcome::KeywordRejected;
                    }
                }
            }
        }

        self.seen.insert(target.url.clone());
        self.queues
            .entry(target.priority)
            .or_default()
            .push_back(target);
        self.len += 1;
        self.stats.queued += 1;
        PushOutcome::Queued
    }

    /// Removes the next target to dispatch
    ///
    /// Returns `None` when the frontier is empty, stopped, or the page
    /// ceiling has been reached.
    pub fn pop(&mut self) -> Option<CrawlTarget> {
        if self.stopped || self.limit_reached() {
            return None;
        }

        let mut entry = self.queues.first_entry()?;
        let queue = entry.get_mut();
        let target = match self.strategy {
            Strategy::Bfs => queue.pop_front(),
            Strategy::Dfs => queue.pop_back(),
        };
        if queue.is_empty() {
            entry.remove();
        }

        let target = target?;
        self.len -= 1;
        self.stats.dispatched += 1;
        Some(target)
    }

    /// Number of targets waiting
    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if the URL was ever admitted to this frontier
    pub fn seen(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    /// Returns true once the number of dispatched targets reached max-pages
    pub fn limit_reached(&self) -> bool {
        self.max_pages.reached_by(self.stats.dispatched)
    }

    /// Stops dispatching; queued targets are kept but never popped
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stats(&self) -> FrontierStats {
        self.stats
    }
}
