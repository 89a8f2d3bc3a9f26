//! URL handling module for Stencil
//!
//! This module provides URL normalization, domain extraction, wildcard matching,
//! and the origin policy deciding which discovered links may be followed.

mod normalize;

use crate::config::CrawlerConfig;
use url::Url;

pub use normalize::normalize_url;

/// Extracts the comparable domain of a URL
///
/// The host is lowercased and a leading `www.` is dropped, so
/// `www.example.com` and `example.com` count as the same site.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use stencil::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|host| {
        let host = host.to_lowercase();
        match host.strip_prefix("www.") {
            Some(rest) => rest.to_string(),
            None => host,
        }
    })
}

/// Checks if a domain matches a wildcard pattern
///
/// `example.com` matches only itself; `*.example.com` matches the bare
/// domain and any subdomain of it.
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Decides which discovered links may enter the frontier
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    origin_domain: Option<String>,
    allowed_domains: Vec<String>,
}

impl OriginPolicy {
    /// Builds the policy for a crawl starting at `start`
    ///
    /// With `restrict-to-origin` off and no allowed domains, every http(s)
    /// link is followed.
    pub fn new(start: &Url, config: &CrawlerConfig) -> Self {
        let origin_domain = if config.restrict_to_origin {
            extract_domain(start)
        } else {
            None
        };

        Self {
            origin_domain,
            allowed_domains: config
                .allowed_domains
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    /// Returns true if the link may be followed
    pub fn allows(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let Some(domain) = extract_domain(url) else {
            return false;
        };

        if self.allowed_domains.iter().any(|p| matches_wildcard(p, &domain)) {
            return true;
        }

        match &self.origin_domain {
            Some(origin) => &domain == origin,
            None => self.allowed_domains.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_domain_strips_www() {
        assert_eq!(
            extract_domain(&url("https://www.example.com/")),
            Some("example.com".to_string())
        );
        assert_eq!(
            extract_domain(&url("https://shop.example.com:8443/a")),
            Some("shop.example.com".to_string())
        );
    }

    #[test]
    fn test_wildcard_matching() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "blog.example.com"));
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
        assert!(!matches_wildcard("*.example.com", "myexample.com"));
    }

    #[test]
    fn test_policy_restricts_to_origin() {
        let config = CrawlerConfig::default();
        let policy = OriginPolicy::new(&url("https://www.example.com/"), &config);

        assert!(policy.allows(&url("https://example.com/products")));
        assert!(policy.allows(&url("http://www.example.com/about")));
        assert!(!policy.allows(&url("https://other.org/")));
        assert!(!policy.allows(&url("https://cdn.example.com/")));
    }

    #[test]
    fn test_policy_allowed_domains_extend_origin() {
        let config = CrawlerConfig {
            allowed_domains: vec!["*.example.com".to_string()],
            ..CrawlerConfig::default()
        };
        let policy = OriginPolicy::new(&url("https://example.com/"), &config);

        assert!(policy.allows(&url("https://cdn.example.com/x")));
        assert!(!policy.allows(&url("https://example.org/")));
    }

    #[test]
    fn test_policy_unrestricted() {
        let config = CrawlerConfig {
            restrict_to_origin: false,
            ..CrawlerConfig::default()
        };
        let policy = OriginPolicy::new(&url("https://example.com/"), &config);

        assert!(policy.allows(&url("https://anything.net/")));
        assert!(!policy.allows(&url("ftp://example.com/file")));
    }
}
