//! The per-target fetch pipeline
//!
//! Runs attempts against the chosen fetcher, escalates to rendering when a
//! challenge is observed, backs off between transient failures, and writes
//! every success to the content store before handing it back.

use crate::config::CrawlerConfig;
use crate::crawler::challenge;
use crate::crawler::fetcher::{
    choose_method, FetchAttempt, FetchError, FetchErrorKind, FetchMethod, PageFetcher,
};
use crate::state::TargetState;
use crate::storage::{CachedPage, ContentStore};
use crate::StencilError;
use rand::Rng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Content store shared by every worker of a session
pub type SharedStore = Arc<Mutex<Box<dyn ContentStore>>>;

/// Wraps a store for sharing between workers
pub fn share_store(store: impl ContentStore + 'static) -> SharedStore {
    Arc::new(Mutex::new(Box::new(store)))
}

/// Final status of a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Success { body: String, mime: String },
    /// The last allowed attempt was still answered with a challenge
    ChallengeDetected,
    Failed { kind: FetchErrorKind, attempts: u32 },
}

/// Result of running the pipeline for one URL
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub status: FetchStatus,
    /// Method of the last attempt
    pub fetched_via: FetchMethod,
}

/// Calculates the delay before retry number `attempt` (1-based)
///
/// `base * 2^(attempt-1)` plus uniform jitter in `[0, base)`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis().min(u64::MAX as u128) as u64;
    let exponent = attempt.saturating_sub(1).min(16);
    let backoff = base_ms.saturating_mul(2_u64.pow(exponent));
    let jitter = if base_ms > 0 {
        rand::thread_rng().gen_range(0..base_ms)
    } else {
        0
    };
    Duration::from_millis(backoff.saturating_add(jitter))
}

/// Fetches pages with retry, backoff, challenge escalation and caching
pub struct FetchPipeline {
    config: CrawlerConfig,
    light: Arc<dyn PageFetcher>,
    rendered: Arc<dyn PageFetcher>,
    store: SharedStore,
}

impl FetchPipeline {
    pub fn new(
        config: CrawlerConfig,
        light: Arc<dyn PageFetcher>,
        rendered: Arc<dyn PageFetcher>,
        store: SharedStore,
    ) -> Self {
        Self {
            config,
            light,
            rendered,
            store,
        }
    }

    /// Total attempts allowed per target
    pub fn max_attempts(&self) -> u32 {
        self.config.retry_count.saturating_add(1)
    }

    fn fetcher_for(&self, method: FetchMethod) -> &Arc<dyn PageFetcher> {
        match method {
            FetchMethod::Light => &self.light,
            FetchMethod::Rendered => &self.rendered,
        }
    }

    /// Fetches a URL, starting with `preferred`
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResult)` - The outcome, including failures
    /// * `Err(StencilError)` - The content store could not be written
    pub async fn fetch(&self, url: &str, preferred: FetchMethod) -> crate::Result<FetchResult> {
        let max_attempts = self.max_attempts();
        let base_delay = Duration::from_millis(self.config.retry_base_delay_ms);
        let mut state = TargetState::Queued;
        let mut challenged = preferred == FetchMethod::Rendered;
        let mut attempts = 0;

        loop {
            state = state.transition(TargetState::Dispatched)?;
            attempts += 1;

            let method = choose_method(&self.config, challenged);
            tracing::debug!("Attempt {}/{} for {} via {}", attempts, max_attempts, url, method);

            let failure = match self.fetcher_for(method).fetch(url).await {
                FetchAttempt::Content { body, mime } => {
                    if method == FetchMethod::Rendered && challenge::body_is_challenge(&body) {
                        FetchError::transient("challenge still present after rendering")
                    } else {
                        self.persist(url, &body, &mime, method)?;
                        state.transition(TargetState::Succeeded)?;
                        return Ok(FetchResult {
                            url: url.to_string(),
                            status: FetchStatus::Success { body, mime },
                            fetched_via: method,
                        });
                    }
                }
                FetchAttempt::Challenge => {
                    tracing::info!("Challenge detected at {}, escalating to rendered fetch", url);
                    challenged = true;
                    if attempts >= max_attempts {
                        state.transition(TargetState::Failed)?;
                        return Ok(FetchResult {
                            url: url.to_string(),
                            status: FetchStatus::ChallengeDetected,
                            fetched_via: method,
                        });
                    }
                    state = state.transition(TargetState::Retrying)?;
                    continue;
                }
                FetchAttempt::Error(e) => e,
            };

            if !failure.is_transient() || attempts >= max_attempts {
                tracing::warn!("Giving up on {} after {} attempts: {}", url, attempts, failure);
                state.transition(TargetState::Failed)?;
                return Ok(FetchResult {
                    url: url.to_string(),
                    status: FetchStatus::Failed {
                        kind: failure.kind,
                        attempts,
                    },
                    fetched_via: method,
                });
            }

            state = state.transition(TargetState::Retrying)?;
            let delay = backoff_delay(base_delay, attempts);
            tracing::warn!("{} for {}, retrying in {:?}", failure, url, delay);
            tokio::time::sleep(delay).await;
        }
    }

    fn persist(&self, url: &str, body: &str, mime: &str, method: FetchMethod) -> crate::Result<()> {
        let page = CachedPage::new(url, body, mime, method);
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.put(&page).map_err(|e| {
            tracing::error!("Failed to cache {}: {}", url, e);
            StencilError::from(e)
        })
    }
}
