//! Weighted glob patterns bound to a MIME type.
//!
//! A [`GlobPattern`] couples a shell-style wildcard with the type it
//! identifies, a weight used to rank competing matches, and a case rule.
//!
//! # Glob Syntax
//!
//! - `*` - Matches zero or more characters
//! - `?` - Matches exactly one character
//! - `[abc]` - Matches one character from the set
//! - `[!abc]` or `[^abc]` - Matches one character NOT in the set
//! - `[a-z]` - Matches one character in the range
//! - `\x` - Escapes special character x
//!
//! # Examples
//!
//! ```
//! use mimedb::glob::{GlobPattern, MatchMode};
//!
//! let pattern = GlobPattern::new("*.txt", "text/plain", 50, MatchMode::CaseInsensitive)?;
//! assert!(pattern.matches("notes.TXT"));
//! assert!(!pattern.matches("notes.pdf"));
//! assert_eq!(pattern.suffix(), Some("txt"));
//! # Ok::<(), mimedb::MimeError>(())
//! ```

use crate::error::MimeError;
use std::fmt;

/// Weight given to patterns that do not declare one.
pub const DEFAULT_WEIGHT: u32 = 50;

/// Stored weight for a declared weight: 0 means "unspecified".
pub fn normalize_weight(weight: u32) -> u32 {
    if weight == 0 {
        DEFAULT_WEIGHT
    } else {
        weight
    }
}

/// Match mode for glob patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// Case-sensitive matching
    CaseSensitive,
    /// Case-insensitive matching
    CaseInsensitive,
}

impl MatchMode {
    /// Mode for a `case-sensitive` flag as stored in definitions and caches.
    pub fn from_flag(case_sensitive: bool) -> Self {
        if case_sensitive {
            MatchMode::CaseSensitive
        } else {
            MatchMode::CaseInsensitive
        }
    }

    /// True for [`MatchMode::CaseSensitive`].
    pub fn is_case_sensitive(self) -> bool {
        self == MatchMode::CaseSensitive
    }
}

/// Shape of a pattern, used to decide which cache table stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// No wildcards at all (`Makefile`)
    Literal,
    /// `*` followed by wildcard-free text (`*.tar.gz`)
    Suffix,
    /// Anything else (`README*`, `*.[ch]`)
    Complex,
}

/// One element of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GlobToken {
    /// Literal character (already lower-cased for case-insensitive patterns)
    Char(char),
    /// `?`
    AnyChar,
    /// `*`
    AnyRun,
    /// `[...]`
    Class {
        items: Vec<ClassItem>,
        negated: bool,
    },
}

/// Item in a character class.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Single(char),
    Range(char, char),
}

/// A weighted glob pattern owned by a MIME type.
///
/// Equality is per (pattern, type) pair; weight and case are not part of the
/// identity, and duplicate registrations are kept as separate entries.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    mime_type: String,
    weight: u32,
    mode: MatchMode,
    tokens: Vec<GlobToken>,
}

impl GlobPattern {
    /// Creates a pattern. A weight of 0 is stored as [`DEFAULT_WEIGHT`].
    ///
    /// # Errors
    ///
    /// Returns [`MimeError::InvalidPattern`] for an empty pattern, an
    /// unclosed or empty character class, a reversed range or a trailing
    /// backslash.
    pub fn new(
        pattern: &str,
        mime_type: &str,
        weight: u32,
        mode: MatchMode,
    ) -> Result<Self, MimeError> {
        if pattern.is_empty() {
            return Err(MimeError::InvalidPattern(format!(
                "empty pattern for {}",
                mime_type
            )));
        }
        let tokens = parse(pattern, mode)?;
        Ok(Self {
            pattern: pattern.to_string(),
            mime_type: mime_type.to_string(),
            weight: normalize_weight(weight),
            mode,
            tokens,
        })
    }

    /// Returns the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the owning type name.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Returns the weight (never 0).
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Returns the match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Length used by the tie-break, in characters.
    pub fn len(&self) -> usize {
        self.pattern.chars().count()
    }

    /// Always false; patterns are rejected when empty.
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// Text after a leading `*.`, if the pattern has one.
    pub fn suffix(&self) -> Option<&str> {
        suffix_of(&self.pattern)
    }

    /// Classifies the pattern for storage in the binary cache.
    pub fn kind(&self) -> PatternKind {
        let wild = |t: &GlobToken| !matches!(t, GlobToken::Char(_));
        match self.tokens.split_first() {
            Some((GlobToken::AnyRun, rest)) if !rest.is_empty() && !rest.iter().any(wild) => {
                PatternKind::Suffix
            }
            _ if !self.tokens.iter().any(wild) => PatternKind::Literal,
            _ => PatternKind::Complex,
        }
    }

    /// Wildcard-free text of a literal pattern, or the part after the `*` of
    /// a suffix pattern. Case-folded for case-insensitive patterns.
    pub(crate) fn fixed_text(&self) -> Option<String> {
        let rest = match self.kind() {
            PatternKind::Literal => &self.tokens[..],
            PatternKind::Suffix => &self.tokens[1..],
            PatternKind::Complex => return None,
        };
        Some(
            rest.iter()
                .filter_map(|t| match t {
                    GlobToken::Char(c) => Some(*c),
                    _ => None,
                })
                .collect(),
        )
    }

    /// Checks whether `file_name` matches this pattern.
    pub fn matches(&self, file_name: &str) -> bool {
        let text: Vec<char> = match self.mode {
            MatchMode::CaseSensitive => file_name.chars().collect(),
            MatchMode::CaseInsensitive => file_name.chars().map(fold).collect(),
        };
        self.matches_chars(&text)
    }

    /// Wildcard match with single backtrack point on the last `*`.
    fn matches_chars(&self, text: &[char]) -> bool {
        let tokens = &self.tokens;
        let (mut t, mut p) = (0usize, 0usize);
        let mut star: Option<(usize, usize)> = None;

        while t < text.len() {
            if p < tokens.len() {
                match &tokens[p] {
                    GlobToken::AnyRun => {
                        star = Some((p, t));
                        p += 1;
                        continue;
                    }
                    token if token_matches(token, text[t]) => {
                        t += 1;
                        p += 1;
                        continue;
                    }
                    _ => {}
                }
            }
            match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, t));
                }
                None => return false,
            }
        }

        tokens[p..].iter().all(|tok| *tok == GlobToken::AnyRun)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.mime_type == other.mime_type
    }
}

impl Eq for GlobPattern {}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, weight {})", self.pattern, self.mime_type, self.weight)
    }
}

/// Text after a leading `*.` in `pattern`.
pub(crate) fn suffix_of(pattern: &str) -> Option<&str> {
    pattern.strip_prefix("*.")
}

/// Single-character case fold used for case-insensitive comparisons.
pub(crate) fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn token_matches(token: &GlobToken, ch: char) -> bool {
    match token {
        GlobToken::Char(c) => *c == ch,
        GlobToken::AnyChar => true,
        GlobToken::AnyRun => false,
        GlobToken::Class { items, negated } => {
            let hit = items.iter().any(|item| match item {
                ClassItem::Single(c) => *c == ch,
                ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&ch),
            });
            hit != *negated
        }
    }
}

fn parse(pattern: &str, mode: MatchMode) -> Result<Vec<GlobToken>, MimeError> {
    let norm = |c: char| match mode {
        MatchMode::CaseSensitive => c,
        MatchMode::CaseInsensitive => fold(c),
    };
    let mut tokens = Vec::new();
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                // Collapse runs of stars
                if tokens.last() != Some(&GlobToken::AnyRun) {
                    tokens.push(GlobToken::AnyRun);
                }
            }
            '?' => tokens.push(GlobToken::AnyChar),
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    MimeError::InvalidPattern(format!("trailing backslash in {:?}", pattern))
                })?;
                tokens.push(GlobToken::Char(norm(escaped)));
            }
            '[' => {
                let negated = matches!(chars.peek(), Some('!') | Some('^'));
                if negated {
                    chars.next();
                }
                let mut items = Vec::new();
                let mut first = true;
                loop {
                    let c = chars.next().ok_or_else(|| {
                        MimeError::InvalidPattern(format!(
                            "unclosed character class in {:?}",
                            pattern
                        ))
                    })?;
                    // A ']' right after '[' is a literal member
                    if c == ']' && !first {
                        break;
                    }
                    first = false;
                    let is_range = chars.peek() == Some(&'-')
                        && chars.clone().nth(1).is_some_and(|n| n != ']');
                    if is_range {
                        chars.next();
                        let hi = chars.next().unwrap_or(c);
                        if c > hi {
                            return Err(MimeError::InvalidPattern(format!(
                                "invalid character range {}-{} in {:?}",
                                c, hi, pattern
                            )));
                        }
                        items.push(ClassItem::Range(norm(c), norm(hi)));
                    } else {
                        items.push(ClassItem::Single(norm(c)));
                    }
                }
                if items.is_empty() {
                    return Err(MimeError::InvalidPattern(format!(
                        "empty character class in {:?}",
                        pattern
                    )));
                }
                tokens.push(GlobToken::Class { items, negated });
            }
            _ => tokens.push(GlobToken::Char(norm(ch))),
        }
    }

    Ok(tokens)
}
