//! Keyword scoring for discovered links and fetched pages

/// A case-folded keyword list with a match threshold
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    keywords: Vec<String>,
    threshold: u32,
}

impl KeywordSet {
    /// Creates a keyword set
    ///
    /// # Arguments
    ///
    /// * `keywords` - Keywords to look for; blank entries are dropped
    /// * `threshold` - Minimum number of distinct keywords a link must hit
    pub fn new(keywords: impl IntoIterator<Item = String>, threshold: u32) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            keywords,
            threshold,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Counts the keywords found in a link's URL or anchor text
    pub fn score(&self, url: &str, anchor_text: &str) -> u32 {
        let url = url.to_lowercase();
        let anchor = anchor_text.to_lowercase();

        self.keywords
            .iter()
            .filter(|k| url.contains(k.as_str()) || anchor.contains(k.as_str()))
            .count() as u32
    }

    /// Returns true if a link scores at or above the threshold
    pub fn matches_link(&self, url: &str, anchor_text: &str) -> bool {
        self.score(url, anchor_text) >= self.threshold
    }

    /// Returns true if a page body mentions at least one keyword
    pub fn matches_content(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.keywords.iter().any(|k| body.contains(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str], threshold: u32) -> KeywordSet {
        KeywordSet::new(words.iter().map(|w| w.to_string()), threshold)
    }

    #[test]
    fn test_score_counts_distinct_keywords() {
        let keywords = set(&["product", "price"], 1);
        assert_eq!(keywords.score("https://example.com/product/1", "See price"), 2);
        assert_eq!(keywords.score("https://example.com/product/1", "Details"), 1);
        assert_eq!(keywords.score("https://example.com/about", "About us"), 0);
    }

    #[test]
    fn test_scoring_is_case_insensitive() {
        let keywords = set(&["Sale"], 1);
        assert!(keywords.matches_link("https://example.com/SALE", ""));
        assert!(keywords.matches_link("https://example.com/", "Big SaLe today"));
    }

    #[test]
    fn test_threshold() {
        let keywords = set(&["red", "shoes"], 2);
        assert!(!keywords.matches_link("https://example.com/red", ""));
        assert!(keywords.matches_link("https://example.com/red-shoes", ""));
    }

    #[test]
    fn test_blank_keywords_dropped() {
        let keywords = set(&["", "  ", "ok"], 1);
        assert_eq!(keywords.len(), 1);
    }

    #[test]
    fn test_matches_content() {
        let keywords = set(&["warranty"], 1);
        assert!(keywords.matches_content("<p>Two year WARRANTY</p>"));
        assert!(!keywords.matches_content("<p>Nothing here</p>"));
    }
}
