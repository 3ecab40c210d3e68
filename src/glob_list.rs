//! Glob pattern collection and the weight/length tie-break.
//!
//! [`GlobMatchResult`] is the running "best match" state shared by every
//! name-based lookup: the in-memory [`GlobMatcher`], the binary cache's
//! literal/glob lists and suffix tree, and the database facade when it merges
//! providers.

use crate::glob::{suffix_of, GlobPattern};
use serde::Serialize;

/// Outcome of a name-based lookup.
///
/// `types` holds every equally-ranked winner; more than one entry means the
/// name is ambiguous and the caller has to decide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobMatch {
    /// Winning type names in match order
    pub types: Vec<String>,
    /// Text following the `*.` of the winning pattern, if it had one
    pub suffix: Option<String>,
}

impl GlobMatch {
    /// True when nothing matched.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The single winner, or `None` when empty or ambiguous.
    pub fn unique(&self) -> Option<&str> {
        match self.types.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// Accumulator implementing the glob tie-break.
#[derive(Debug, Clone, Default)]
pub struct GlobMatchResult {
    weight: u32,
    pattern_len: usize,
    types: Vec<String>,
    suffix: Option<String>,
}

impl GlobMatchResult {
    /// Creates an empty result (weight 0, length 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a candidate match.
    ///
    /// Lower weight loses. Higher weight replaces. At equal weight a longer
    /// pattern replaces, a shorter one loses and an equal one is added to the
    /// ambiguous set.
    pub fn add_match(&mut self, mime_type: &str, weight: u32, pattern: &str) {
        if weight < self.weight {
            return;
        }
        let pattern_len = pattern.chars().count();
        let mut replace = weight > self.weight;
        if !replace {
            if pattern_len < self.pattern_len {
                return;
            }
            replace = pattern_len > self.pattern_len;
        }
        if replace {
            self.types.clear();
            self.suffix = None;
            self.pattern_len = pattern_len;
            self.weight = weight;
        }
        if !self.types.iter().any(|t| t == mime_type) {
            self.types.push(mime_type.to_string());
        }
        if let Some(suffix) = suffix_of(pattern) {
            self.suffix = Some(suffix.to_string());
        }
    }

    /// Current best weight (0 when empty).
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Current best pattern length in characters.
    pub fn pattern_len(&self) -> usize {
        self.pattern_len
    }

    /// True when nothing has matched yet.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Consumes the accumulator.
    pub fn into_match(self) -> GlobMatch {
        GlobMatch {
            types: self.types,
            suffix: self.suffix,
        }
    }
}

/// All registered glob patterns, in registration order.
#[derive(Debug, Clone, Default)]
pub struct GlobMatcher {
    patterns: Vec<GlobPattern>,
}

impl GlobMatcher {
    /// Creates an empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pattern. Duplicates are kept.
    pub fn add(&mut self, pattern: GlobPattern) {
        self.patterns.push(pattern);
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when no pattern is registered.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Registered patterns in registration order.
    pub fn patterns(&self) -> &[GlobPattern] {
        &self.patterns
    }

    /// Feeds every pattern matching `file_name` into `result`.
    pub fn match_into(&self, file_name: &str, result: &mut GlobMatchResult) {
        for glob in &self.patterns {
            if glob.matches(file_name) {
                result.add_match(glob.mime_type(), glob.weight(), glob.pattern());
            }
        }
    }

    /// Best type name(s) for `file_name` plus the matched suffix.
    pub fn find(&self, file_name: &str) -> GlobMatch {
        let mut result = GlobMatchResult::new();
        self.match_into(file_name, &mut result);
        result.into_match()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glob::MatchMode;

    fn matcher(entries: &[(&str, &str, u32)]) -> GlobMatcher {
        let mut m = GlobMatcher::new();
        for (pattern, mime, weight) in entries {
            m.add(GlobPattern::new(pattern, mime, *weight, MatchMode::CaseInsensitive).unwrap());
        }
        m
    }

    #[test]
    fn test_longer_pattern_wins_at_equal_weight() {
        let m = matcher(&[
            ("*.bz2", "application/x-bzip", 50),
            ("*.tar.bz2", "application/x-bzip-compressed-tar", 50),
        ]);
        let found = m.find("archive.tar.bz2");
        assert_eq!(found.types, vec!["application/x-bzip-compressed-tar"]);
        assert_eq!(found.suffix.as_deref(), Some("tar.bz2"));

        // Registration order does not matter
        let m = matcher(&[
            ("*.tar.bz2", "application/x-bzip-compressed-tar", 50),
            ("*.bz2", "application/x-bzip", 50),
        ]);
        assert_eq!(
            m.find("archive.tar.bz2").types,
            vec!["application/x-bzip-compressed-tar"]
        );
        assert_eq!(m.find("single.bz2").types, vec!["application/x-bzip"]);
    }

    #[test]
    fn test_weight_dominates_length() {
        let m = matcher(&[("*.txt", "text/x-low", 50), ("*.txt", "text/x-high", 80)]);
        assert_eq!(m.find("a.txt").types, vec!["text/x-high"]);

        let m = matcher(&[("*.tar.bz2", "x/long", 40), ("*.bz2", "x/short", 60)]);
        assert_eq!(m.find("a.tar.bz2").types, vec!["x/short"]);
    }

    #[test]
    fn test_ambiguity_preserved() {
        let m = matcher(&[("*.asc", "text/plain", 50), ("*.asc", "application/pgp", 50)]);
        let found = m.find("key.asc");
        assert_eq!(found.types, vec!["text/plain", "application/pgp"]);
        assert_eq!(found.unique(), None);
    }

    #[test]
    fn test_duplicate_type_not_repeated() {
        let m = matcher(&[("*.c", "text/x-csrc", 50), ("*.c", "text/x-csrc", 50)]);
        assert_eq!(m.find("main.c").types, vec!["text/x-csrc"]);
    }

    #[test]
    fn test_suffix_reset_by_non_suffix_winner() {
        let mut result = GlobMatchResult::new();
        result.add_match("text/plain", 50, "*.txt");
        result.add_match("text/x-readme", 80, "README*");
        let found = result.into_match();
        assert_eq!(found.types, vec!["text/x-readme"]);
        assert_eq!(found.suffix, None);
    }

    #[test]
    fn test_no_match() {
        let m = matcher(&[("*.png", "image/png", 50)]);
        let found = m.find("photo.jpg");
        assert!(found.is_empty());
        assert_eq!(found.suffix, None);
    }
}
