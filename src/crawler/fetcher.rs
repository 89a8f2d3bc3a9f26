//! Page fetchers
//!
//! This module defines the two ways a page can be retrieved and the
//! capability trait they share:
//! - `LightFetcher`: a plain HTTP GET with a browser-like header set
//! - `RenderedFetcher` (see `render`): a scripted browser page load
//!
//! It also classifies failures as transient (worth retrying) or permanent.

use crate::config::CrawlerConfig;
use crate::crawler::challenge;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// User agent sent when the configuration does not override it
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Mime type assumed when a response does not declare one
pub const DEFAULT_MIME: &str = "text/html";

/// The capability used to retrieve a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMethod {
    /// Direct HTTP request
    Light,
    /// Scripted browser page load
    Rendered,
}

impl FetchMethod {
    /// Converts the method to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Rendered => "rendered",
        }
    }

    /// Parses a method from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "rendered" => Some(Self::Rendered),
            _ => None,
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Picks the fetch method for the next attempt on a URL
///
/// `selenium-only` skips the light fetch entirely; otherwise a URL is
/// rendered only after a challenge was observed for it.
pub fn choose_method(config: &CrawlerConfig, challenged: bool) -> FetchMethod {
    if config.selenium_only || challenged {
        FetchMethod::Rendered
    } else {
        FetchMethod::Light
    }
}

/// Whether a failed fetch is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Timeout, connection failure, 5xx, or rate limiting
    Transient,
    /// Client errors and malformed URLs
    Permanent,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// A failed fetch attempt
#[derive(Debug, Clone, Error)]
#[error("{kind} fetch error: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }
}

/// Outcome of a single fetch attempt
#[derive(Debug, Clone)]
pub enum FetchAttempt {
    /// The page content
    Content { body: String, mime: String },
    /// An anti-bot interstitial was served instead of content
    Challenge,
    /// The attempt failed
    Error(FetchError),
}

/// A way of retrieving a page
///
/// Implementations perform exactly one attempt; retries and escalation are
/// the caller's concern.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// The method this fetcher implements
    fn method(&self) -> FetchMethod;

    /// Performs one fetch attempt
    async fn fetch(&self, url: &str) -> FetchAttempt;
}

/// Builds the HTTP client used for light fetches
///
/// # Arguments
///
/// * `config` - The crawler configuration (timeout and user agent)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| BROWSER_USER_AGENT.to_string());

    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(config.page_timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Classifies an HTTP error status
///
/// | Status | Kind |
/// |--------|------|
/// | 408, 429 | Transient |
/// | 5xx | Transient |
/// | other 4xx | Permanent |
pub fn classify_status(status: StatusCode) -> FetchErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        FetchErrorKind::Transient
    } else {
        FetchErrorKind::Permanent
    }
}

/// Classifies a transport-level error
fn classify_reqwest_error(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::transient("Request timeout")
    } else if error.is_connect() {
        FetchError::transient(format!("Connection failed: {}", error))
    } else if error.is_builder() || error.is_redirect() {
        FetchError::permanent(error.to_string())
    } else {
        FetchError::transient(error.to_string())
    }
}

/// Extracts the bare mime type from a Content-Type header
fn mime_of(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_MIME.to_string())
}

/// Plain HTTP fetcher
pub struct LightFetcher {
    client: Client,
}

impl LightFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for LightFetcher {
    fn method(&self) -> FetchMethod {
        FetchMethod::Light
    }

    async fn fetch(&self, url: &str) -> FetchAttempt {
        if let Err(e) = url::Url::parse(url) {
            return FetchAttempt::Error(FetchError::permanent(format!(
                "Malformed URL {}: {}",
                url, e
            )));
        }

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return FetchAttempt::Error(classify_reqwest_error(&e)),
        };

        let status = response.status();
        let headers = response.headers().clone();
        let mime = mime_of(&headers);

        if challenge::headers_indicate_challenge(status, &headers) {
            return FetchAttempt::Challenge;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return FetchAttempt::Error(classify_reqwest_error(&e)),
        };

        if !status.is_success() {
            let blocked = matches!(
                status,
                StatusCode::FORBIDDEN
                    | StatusCode::TOO_MANY_REQUESTS
                    | StatusCode::SERVICE_UNAVAILABLE
            );
            if blocked && !body.trim().is_empty() && challenge::body_is_challenge(&body) {
                return FetchAttempt::Challenge;
            }

            return FetchAttempt::Error(FetchError {
                kind: classify_status(status),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        if challenge::body_is_challenge(&body) {
            return FetchAttempt::Challenge;
        }

        FetchAttempt::Content { body, mime }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_method() {
        let mut config = CrawlerConfig::default();
        assert_eq!(choose_method(&config, false), FetchMethod::Light);
        assert_eq!(choose_method(&config, true), FetchMethod::Rendered);

        config.selenium_only = true;
        assert_eq!(choose_method(&config, false), FetchMethod::Rendered);
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            FetchErrorKind::Transient
        );
        assert_eq!(
            classify_status(StatusCode::REQUEST_TIMEOUT),
            FetchErrorKind::Transient
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            FetchErrorKind::Transient
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            FetchErrorKind::Permanent
        );
        assert_eq!(
            classify_status(StatusCode::GONE),
            FetchErrorKind::Permanent
        );
    }

    #[test]
    fn test_method_db_strings() {
        assert_eq!(FetchMethod::from_db_string("light"), Some(FetchMethod::Light));
        assert_eq!(
            FetchMethod::from_db_string(FetchMethod::Rendered.to_db_string()),
            Some(FetchMethod::Rendered)
        );
        assert_eq!(FetchMethod::from_db_string("selenium"), None);
    }

    #[test]
    fn test_mime_of() {
        let mut headers = HeaderMap::new();
        assert_eq!(mime_of(&headers), "text/html");

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Application/JSON; charset=utf-8"),
        );
        assert_eq!(mime_of(&headers), "application/json");
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&CrawlerConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_url_is_permanent() {
        let fetcher = LightFetcher::new(&CrawlerConfig::default()).unwrap();
        match fetcher.fetch("not a url").await {
            FetchAttempt::Error(e) => assert_eq!(e.kind, FetchErrorKind::Permanent),
            other => panic!("unexpected attempt: {:?}", other),
        }
    }
}
