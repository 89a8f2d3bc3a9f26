use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Stencil
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub project: ProjectConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Locates the keyword file
    ///
    /// A relative path is looked up in the project directory first, then
    /// relative to the working directory.
    pub fn keyword_file_path(&self) -> PathBuf {
        let path = &self.crawler.keyword_file;
        if path.is_absolute() {
            return path.clone();
        }
        let in_project = self.project.project_dir.join(path);
        if in_project.is_file() {
            in_project
        } else {
            path.clone()
        }
    }
}

/// Frontier discipline for a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Breadth-first: oldest target is dispatched first
    #[default]
    Bfs,
    /// Depth-first: most recently pushed target is dispatched first
    Dfs,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Bfs => write!(f, "bfs"),
            Strategy::Dfs => write!(f, "dfs"),
        }
    }
}

/// A count ceiling that may be switched off with the word `"infinite"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "LimitRepr")]
pub enum Limit {
    Finite(u32),
    Infinite,
}

impl Limit {
    /// Returns true if `value` is beyond this ceiling
    pub fn exceeded_by(&self, value: u32) -> bool {
        match self {
            Limit::Finite(max) => value > *max,
            Limit::Infinite => false,
        }
    }

    /// Returns true once `count` has reached this ceiling
    pub fn reached_by(&self, count: u32) -> bool {
        match self {
            Limit::Finite(max) => count >= *max,
            Limit::Infinite => false,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Finite(n) => write!(f, "{}", n),
            Limit::Infinite => write!(f, "infinite"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LimitRepr {
    Count(u32),
    Word(String),
}

impl TryFrom<LimitRepr> for Limit {
    type Error = String;

    fn try_from(repr: LimitRepr) -> Result<Self, Self::Error> {
        match repr {
            LimitRepr::Count(n) => Ok(Limit::Finite(n)),
            LimitRepr::Word(word) if word.eq_ignore_ascii_case("infinite") => Ok(Limit::Infinite),
            LimitRepr::Word(word) => Err(format!(
                "expected a non-negative integer or \"infinite\", got \"{}\"",
                word
            )),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Frontier discipline
    pub strategy: Strategy,

    /// Maximum number of targets dispatched per session
    pub max_pages: Limit,

    /// Maximum link depth from the start URL
    pub max_depth: Limit,

    /// Size of the worker pool
    pub max_workers: u32,

    /// Disables the randomized delay between a worker's dispatches
    pub no_delay: bool,

    /// Bounds of the randomized dispatch delay (milliseconds)
    pub delay_range_ms: [u64; 2],

    /// Skip the light fetch and render every page in the browser
    pub selenium_only: bool,

    /// Reject links that do not match the keyword set instead of deprioritizing them
    pub use_keywords: bool,

    /// File holding one keyword per line
    pub keyword_file: PathBuf,

    /// Minimum keyword score for a link to keep normal priority
    pub keyword_threshold: u32,

    /// Light fetch timeout (seconds)
    pub page_timeout: u64,

    /// Rendered fetch settle timeout (seconds)
    pub selenium_timeout: u64,

    /// Retries after the first attempt for transient failures
    pub retry_count: u32,

    /// Base of the exponential backoff (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Clear the content store and bypass it for lookups
    pub no_cache: bool,

    /// Only follow links on the start URL's domain
    pub restrict_to_origin: bool,

    /// Extra domain patterns that may be followed (e.g. "*.example.com")
    pub allowed_domains: Vec<String>,

    /// Overrides the browser-like User-Agent header
    pub user_agent: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Bfs,
            max_pages: Limit::Finite(100),
            max_depth: Limit::Infinite,
            max_workers: 5,
            no_delay: false,
            delay_range_ms: [1000, 3000],
            selenium_only: false,
            use_keywords: false,
            keyword_file: PathBuf::from("keywords.txt"),
            keyword_threshold: 1,
            page_timeout: 10,
            selenium_timeout: 15,
            retry_count: 3,
            retry_base_delay_ms: 500,
            no_cache: false,
            restrict_to_origin: true,
            allowed_domains: Vec::new(),
            user_agent: None,
        }
    }
}

impl CrawlerConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout)
    }

    pub fn selenium_timeout(&self) -> Duration {
        Duration::from_secs(self.selenium_timeout)
    }
}

/// Project identification
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// The page the crawl starts from
    pub start_url: String,

    /// Directory holding the content store and the produced artifacts
    pub project_dir: PathBuf,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Template descriptor (JSON), relative to the project directory
    pub template_path: PathBuf,

    /// Markdown summary of the template, relative to the project directory
    pub summary_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("template.json"),
            summary_path: PathBuf::from("template.md"),
        }
    }
}
