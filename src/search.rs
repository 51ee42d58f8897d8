//! Fuzzy matching for locally filtered pages.
//!
//! Wraps the fuzzy matching implementation behind a small interface so
//! the rest of the code never touches the matcher crate directly.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

pub struct Matcher {
    inner: SkimMatcherV2,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher {
    pub fn new() -> Self {
        Self {
            inner: SkimMatcherV2::default(),
        }
    }

    /// Case-insensitive fuzzy match allowing non-consecutive characters.
    pub fn matches(&self, text: &str, pattern: &str) -> bool {
        let pattern_lower = pattern.to_lowercase();
        self.inner.fuzzy_match(text, &pattern_lower).is_some()
    }

    /// Check if any of the provided texts match the pattern.
    pub fn matches_any<'a>(&self, texts: impl IntoIterator<Item = &'a str>, pattern: &str) -> bool {
        texts.into_iter().any(|text| self.matches(text, pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_match_is_case_insensitive() {
        let matcher = Matcher::new();
        assert!(matcher.matches("ops@example.com", "opex"));
        assert!(matcher.matches("OPS@EXAMPLE.COM", "opex"));
        assert!(!matcher.matches("ops@example.com", "xyz"));
    }

    #[test]
    fn matches_any_checks_every_field() {
        let matcher = Matcher::new();
        let texts = ["ops@example.com", "operator"];
        assert!(matcher.matches_any(texts, "oper"));
        assert!(!matcher.matches_any(texts, "qqq"));
    }
}
