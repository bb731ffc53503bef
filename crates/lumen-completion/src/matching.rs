//! Per-candidate match records and their ordering contract.

use std::cmp::Ordering;
use std::sync::Arc;

use lumen_fuzzy::{FuzzyMatcher, PatternMatch};

use crate::item::CompletionItem;

/// Ephemeral per-candidate match state, recomputed on every filter-text change.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub item: Arc<CompletionItem>,
    pub pattern_match: Option<PatternMatch>,
    /// The item should be treated as actually matching the typed filter text.
    pub matched_filter_text: bool,
    /// The match came from an additional filter text; the primary one did not match.
    pub matched_additional_only: bool,
    /// Recency of the last commit of this item's key, if any. Higher is more recent.
    pub recent_index: Option<usize>,
    /// Position in the original provider-sorted list. Used as the stable
    /// tie-break since the sort is not otherwise stable for equal matches.
    pub original_index: usize,
}

impl MatchResult {
    /// Total order over match results: match quality descending, then original
    /// position ascending.
    pub fn compare(a: &MatchResult, b: &MatchResult) -> Ordering {
        match (&a.pattern_match, &b.pattern_match) {
            (Some(x), Some(y)) => y
                .rank_key()
                .cmp(&x.rank_key())
                .then_with(|| a.original_index.cmp(&b.original_index)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.original_index.cmp(&b.original_index),
        }
    }

    /// Two results are in the same equivalence class when their matches have
    /// identical kind and case sensitivity.
    pub(crate) fn same_match_class(&self, other: &MatchResult) -> bool {
        match (&self.pattern_match, &other.pattern_match) {
            (Some(a), Some(b)) => a.kind == b.kind && a.case_sensitive == b.case_sensitive,
            (None, None) => true,
            _ => false,
        }
    }
}

/// Score one candidate against the session's current filter text.
///
/// The primary filter text is matched first; additional filter texts can only
/// improve the outcome. Returns the best match and whether it came solely from
/// an additional filter text.
pub(crate) fn compute_match(
    item: &CompletionItem,
    matcher: &mut FuzzyMatcher,
) -> (Option<PatternMatch>, bool) {
    let primary = matcher.score(&item.filter_text);
    let mut best = primary.clone();
    for extra in &item.additional_filter_texts {
        if let Some(m) = matcher.score(extra) {
            if best.as_ref().map_or(true, |b| m.rank_key() > b.rank_key()) {
                best = Some(m);
            }
        }
    }
    let additional_only = primary.is_none() && best.is_some();
    (best, additional_only)
}

/// Provider-pluggable reduction of the sorted match list to true matches.
pub trait MatchFilter: Send + Sync {
    /// Indices into `results` that count as real matches, in `results` order.
    fn filter(&self, results: &[MatchResult], filter_text: &str) -> Vec<usize>;
}

/// Default reduction: keep results whose pattern actually matched.
pub struct DefaultMatchFilter;

impl MatchFilter for DefaultMatchFilter {
    fn filter(&self, results: &[MatchResult], _filter_text: &str) -> Vec<usize> {
        results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.matched_filter_text)
            .map(|(i, _)| i)
            .collect()
    }
}
