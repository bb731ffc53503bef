//! Pattern matching primitives for the Lumen completion pipeline.
//!
//! The design pairs a fast case-insensitive prefix check with a fuzzy
//! subsequence scorer for everything else. Unlike a plain scorer, every match
//! also reports the candidate byte ranges that matched, so the completion UI
//! can bold the matched characters.
//!
//! Matching is ASCII case-insensitive: inputs are treated as raw UTF-8 bytes
//! and only `A-Z`/`a-z` are folded; non-ASCII bytes must match exactly. The
//! optional case-sensitive mode (used for non-language candidate sets) skips
//! the fold entirely.

#![forbid(unsafe_code)]

mod scoring;

pub use scoring::{fuzzy_match, FuzzyMatcher, MatchKind, PatternMatch, RankKey};

#[inline]
fn fold_byte(b: u8) -> u8 {
    b.to_ascii_lowercase()
}

/// Case-insensitive prefix match.
#[inline]
pub fn prefix_match(query: &str, candidate: &str) -> bool {
    fuzzy_match(query, candidate).is_some_and(|m| m.kind >= MatchKind::Prefix)
}

/// Length in bytes of the longest common case-insensitive prefix of `a` and `b`.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes()
        .zip(b.bytes())
        .take_while(|&(x, y)| fold_byte(x) == fold_byte(y))
        .count()
}

/// Length in bytes of the longest common case-sensitive prefix of `a` and `b`.
pub fn common_prefix_len_exact(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|&(x, y)| x == y).count()
}
