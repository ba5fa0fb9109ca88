//! Substring blocklist filter.

use super::Filter;

/// Separator between banned substrings in a keyword spec.
pub const KEYWORD_SEPARATOR: char = '|';

/// Drops any line containing one of a set of banned substrings.
///
/// Matching is plain substring containment, not a regex. An empty spec
/// passes every line through unchanged.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    /// Build from a `|`-separated spec such as `"DEBUG|TRACE"`.
    ///
    /// Empty segments are ignored, so `"a||b"` bans only `a` and `b`.
    pub fn new(spec: &str) -> Self {
        Self::from_keywords(spec.split(KEYWORD_SEPARATOR))
    }

    pub fn from_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords = keywords
            .into_iter()
            .map(Into::into)
            .filter(|k: &String| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn is_banned(&self, line: &str) -> bool {
        self.keywords.iter().any(|k| line.contains(k.as_str()))
    }
}

impl Filter for KeywordFilter {
    fn apply(&self, line: String) -> Option<String> {
        if self.is_banned(&line) {
            None
        } else {
            Some(line)
        }
    }
}
