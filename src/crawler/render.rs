//! Rendered fetching through a scripted browser
//!
//! With the `browser` feature the page is loaded in headless Chromium and
//! the resolved DOM is serialized back. Without it, every rendered fetch
//! fails permanently so challenge escalations end cleanly.

use crate::crawler::fetcher::{FetchAttempt, FetchMethod, PageFetcher};
#[cfg(feature = "browser")]
use crate::crawler::fetcher::DEFAULT_MIME;
#[cfg(not(feature = "browser"))]
use crate::crawler::fetcher::FetchError;
use async_trait::async_trait;
use std::time::Duration;

/// Pause after navigation so late scripts can finish mutating the DOM
#[cfg(feature = "browser")]
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Fetcher backed by a headless browser
pub struct RenderedFetcher {
    load_timeout: Duration,
    #[cfg(feature = "browser")]
    engine: tokio::sync::OnceCell<engine::Engine>,
}

impl RenderedFetcher {
    /// Creates a fetcher; the browser itself is launched on first use
    ///
    /// # Arguments
    ///
    /// * `load_timeout` - Budget for navigating to a page and waiting for it to load
    pub fn new(load_timeout: Duration) -> Self {
        Self {
            load_timeout,
            #[cfg(feature = "browser")]
            engine: tokio::sync::OnceCell::new(),
        }
    }

    /// Returns true if this build can render pages
    pub fn is_available() -> bool {
        cfg!(feature = "browser")
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    fn method(&self) -> FetchMethod {
        FetchMethod::Rendered
    }

    #[cfg(feature = "browser")]
    async fn fetch(&self, url: &str) -> FetchAttempt {
        let engine = match self.engine.get_or_try_init(engine::Engine::launch).await {
            Ok(engine) => engine,
            Err(e) => return FetchAttempt::Error(e),
        };

        match engine.render(url, self.load_timeout).await {
            Ok(body) => FetchAttempt::Content {
                body,
                mime: DEFAULT_MIME.to_string(),
            },
            Err(e) => FetchAttempt::Error(e),
        }
    }

    #[cfg(not(feature = "browser"))]
    async fn fetch(&self, url: &str) -> FetchAttempt {
        tracing::warn!(
            "Cannot render {} within {:?}: built without the `browser` feature",
            url,
            self.load_timeout
        );
        FetchAttempt::Error(FetchError::permanent(
            "renderer unavailable: built without the `browser` feature",
        ))
    }
}

#[cfg(feature = "browser")]
mod engine {
    use super::SETTLE_DELAY;
    use crate::crawler::fetcher::{FetchError, BROWSER_USER_AGENT};
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;

    pub(super) struct Engine {
        browser: Mutex<Browser>,
        _handler: JoinHandle<()>,
    }

    impl Engine {
        pub(super) async fn launch() -> Result<Self, FetchError> {
            let config = BrowserConfig::builder()
                .arg("--no-sandbox")
                .arg(format!("--user-agent={}", BROWSER_USER_AGENT))
                .build()
                .map_err(|e| FetchError::permanent(format!("Invalid browser config: {}", e)))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| FetchError::permanent(format!("Failed to launch browser: {}", e)))?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            tracing::info!("Headless browser launched");
            Ok(Self {
                browser: Mutex::new(browser),
                _handler: handle,
            })
        }

        pub(super) async fn render(
            &self,
            url: &str,
            timeout: Duration,
        ) -> Result<String, FetchError> {
            let page = {
                let browser = self.browser.lock().await;
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| FetchError::transient(format!("Failed to open tab: {}", e)))?
            };

            let loaded = tokio::time::timeout(timeout, async {
                page.goto(url).await?;
                page.wait_for_navigation().await?;
                Ok::<_, chromiumoxide::error::CdpError>(())
            })
            .await;

            let result = match loaded {
                Ok(Ok(())) => {
                    tokio::time::sleep(SETTLE_DELAY).await;
                    page.content()
                        .await
                        .map_err(|e| FetchError::transient(format!("Failed to read DOM: {}", e)))
                }
                Ok(Err(e)) => Err(FetchError::transient(format!("Navigation failed: {}", e))),
                Err(_) => Err(FetchError::transient(format!(
                    "Timed out after {:?} loading {}",
                    timeout, url
                ))),
            };

            let _ = page.close().await;
            result
        }
    }
}
