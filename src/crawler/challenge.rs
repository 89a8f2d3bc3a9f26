//! Anti-bot challenge detection
//!
//! A challenge page is an interstitial served instead of real content. It is
//! recognized by marker strings in the body or by the status/header pair a
//! protection layer answers with.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

/// Body fragments that only appear on challenge or block pages
const BODY_MARKERS: &[&str] = &[
    "cf-error-details",
    "Cloudflare Ray ID:",
    "Email Protection",
    "cf-browser-verification",
    "/cdn-cgi/challenge-platform/",
    "<title>Just a moment...</title>",
    "Attention Required! | Cloudflare",
    "_Incapsula_Resource",
    "DDoS protection by",
];

/// Returns true if a body carries a challenge marker or is blank
pub fn body_is_challenge(body: &str) -> bool {
    if body.trim().is_empty() {
        return true;
    }
    BODY_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Returns true if the status and headers are those of a protection layer
pub fn headers_indicate_challenge(status: StatusCode, headers: &HeaderMap) -> bool {
    let mitigated = headers
        .get("cf-mitigated")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("challenge"));
    if mitigated {
        return true;
    }

    let behind_cloudflare = headers
        .get(reqwest::header::SERVER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("cloudflare"));

    behind_cloudflare
        && (status == StatusCode::FORBIDDEN || status == StatusCode::SERVICE_UNAVAILABLE)
}

/// Classifies a light-fetch response as a challenge
pub fn detect(status: StatusCode, headers: &HeaderMap, body: &str) -> bool {
    headers_indicate_challenge(status, headers) || body_is_challenge(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_legacy_markers() {
        assert!(body_is_challenge(r#"<div id="cf-error-details">blocked</div>"#));
        assert!(body_is_challenge("<footer>Cloudflare Ray ID: 7d1f</footer>"));
        assert!(body_is_challenge("<h1>Email Protection</h1>"));
    }

    #[test]
    fn test_interstitial_title() {
        let body = "<html><head><title>Just a moment...</title></head><body></body></html>";
        assert!(body_is_challenge(body));
    }

    #[test]
    fn test_empty_body_is_challenge() {
        assert!(body_is_challenge(""));
        assert!(body_is_challenge("  \n "));
    }

    #[test]
    fn test_regular_page() {
        let body = "<html><head><title>Shoes</title></head><body><h1>Red shoes</h1></body></html>";
        assert!(!detect(StatusCode::OK, &HeaderMap::new(), body));
    }

    #[test]
    fn test_cloudflare_status_header_pair() {
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("cloudflare"));

        assert!(detect(StatusCode::FORBIDDEN, &headers, "<p>denied</p>"));
        assert!(detect(StatusCode::SERVICE_UNAVAILABLE, &headers, "<p>wait</p>"));
        assert!(!detect(StatusCode::OK, &headers, "<p>fine</p>"));
        assert!(!detect(StatusCode::FORBIDDEN, &HeaderMap::new(), "<p>denied</p>"));
    }

    #[test]
    fn test_mitigated_header() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-mitigated", HeaderValue::from_static("challenge"));
        assert!(headers_indicate_challenge(StatusCode::OK, &headers));
    }
}
