//! The candidate filtering and ranking engine.
//!
//! Given the cached candidate list, the current filter text, the trigger
//! reason, and the active filter/expander selection, this module derives the
//! visible list, the selected item, its selection strength, and the updated
//! filter bar. Deletion-started sessions use a prefix-length strategy; every
//! other update goes through the pluggable match reduction.

use std::collections::HashMap;
use std::sync::Arc;

use lumen_core::{is_potential_filter_char, TextRange, TextSize};
use lumen_fuzzy::{common_prefix_len, common_prefix_len_exact, FuzzyMatcher};

use crate::filters::{self, FilterRow, FilterSelection};
use crate::item::{match_priority, CompletionItem, ItemId, SelectionBehavior};
use crate::matching::{compute_match, DefaultMatchFilter, MatchFilter, MatchResult};
use crate::mru::RecentItems;
use crate::provider::LanguageDefaults;

/// The kind of edit behind one list update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Insertion,
    Deletion,
    Other,
}

/// Host request to re-derive the visible list after a keystroke.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Text typed since the completion span's start. Empty is valid.
    pub filter_text: String,
    pub kind: UpdateKind,
    pub typed_char: Option<char>,
    /// Filter rows currently toggled on, echoed back from the last update.
    pub selection: FilterSelection,
    /// The completion span starts immediately after a `.`.
    pub span_starts_after_dot: bool,
    /// Display texts of external whole-line suggestions the selection should
    /// stay consistent with.
    pub external_defaults: Vec<String>,
}

impl UpdateRequest {
    pub fn insertion(filter_text: impl Into<String>, typed: char) -> Self {
        Self {
            filter_text: filter_text.into(),
            kind: UpdateKind::Insertion,
            typed_char: Some(typed),
            selection: FilterSelection::EMPTY,
            span_starts_after_dot: false,
            external_defaults: Vec::new(),
        }
    }

    pub fn deletion(filter_text: impl Into<String>, deleted: char) -> Self {
        Self {
            filter_text: filter_text.into(),
            kind: UpdateKind::Deletion,
            typed_char: Some(deleted),
            selection: FilterSelection::EMPTY,
            span_starts_after_dot: false,
            external_defaults: Vec::new(),
        }
    }

    /// A refresh that did not come from an edit (filter toggle, initial view).
    pub fn refresh(filter_text: impl Into<String>) -> Self {
        Self {
            filter_text: filter_text.into(),
            kind: UpdateKind::Other,
            typed_char: None,
            selection: FilterSelection::EMPTY,
            span_starts_after_dot: false,
            external_defaults: Vec::new(),
        }
    }

    pub fn with_selection(mut self, selection: FilterSelection) -> Self {
        self.selection = selection;
        self
    }
}

/// Outcome of one update request.
#[derive(Debug, Clone)]
pub enum UpdateResult {
    /// Dismiss the session.
    Dismiss,
    /// Ignore this keystroke and keep the previous model.
    Ignore,
    Updated(ListUpdate),
}

impl UpdateResult {
    pub fn updated(&self) -> Option<&ListUpdate> {
        match self {
            UpdateResult::Updated(update) => Some(update),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListUpdate {
    pub items: Vec<VisibleItem>,
    pub selection: Selection,
    /// The only real match, when exactly one candidate unambiguously matches
    /// a non-empty filter text.
    pub unique_item: Option<Arc<CompletionItem>>,
    pub filters: Vec<FilterRow>,
}

#[derive(Debug, Clone)]
pub struct VisibleItem {
    pub item: Arc<CompletionItem>,
    /// Prefix + display text + suffix, as rendered by the host.
    pub display: Arc<str>,
    /// Byte ranges into `display` to bold.
    pub highlights: Vec<TextRange>,
}

/// What the host should select, and how strongly. A hard selection commits on
/// an implicit-commit key; a soft selection is merely highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Candidate { index: usize, hard: bool },
    /// Soft-select the suggestion placeholder.
    Suggestion,
    NoSelection,
}

pub(crate) struct UpdateInput<'a> {
    pub items: &'a [Arc<CompletionItem>],
    pub suggestion_mode: bool,
    pub request: &'a UpdateRequest,
    /// Request selection plus any implicit expander selection.
    pub effective_selection: FilterSelection,
    /// The session began with a deletion trigger.
    pub deletion_session: bool,
    /// The session began with an insertion trigger.
    pub started_on_insertion: bool,
    pub expander_available: bool,
    pub recent: &'a RecentItems,
    pub defaults: &'a LanguageDefaults,
    pub case_sensitive: bool,
    pub custom_filter: Option<&'a dyn MatchFilter>,
    pub display_cache: &'a mut HashMap<ItemId, Arc<str>>,
}

pub(crate) fn compute_update(input: UpdateInput<'_>) -> UpdateResult {
    let UpdateInput {
        items,
        suggestion_mode,
        request,
        effective_selection,
        deletion_session,
        started_on_insertion,
        expander_available,
        recent,
        defaults,
        case_sensitive,
        custom_filter,
        display_cache,
    } = input;
    let filter_text = request.filter_text.as_str();

    // Typing a number dismisses completion unless the span follows a `.`
    // (member access on a numeric literal).
    if let Some(first) = filter_text.chars().next() {
        if first.is_ascii_digit() && !request.span_starts_after_dot {
            return UpdateResult::Dismiss;
        }
    }
    if started_on_insertion
        && request.kind == UpdateKind::Deletion
        && filter_text.is_empty()
        && defaults.dismiss_if_last_character_deleted
    {
        return UpdateResult::Dismiss;
    }

    // Per-candidate inclusion: bucket narrowing plus the expander toggle.
    let universe = filters::universe_bits(items);
    let narrowing = effective_selection.narrows(universe);
    let expander_selected = effective_selection.expander_selected();
    let included: Vec<(usize, &Arc<CompletionItem>)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            if narrowing {
                let bits = filters::bucket_bits(item);
                if bits != 0 && bits & effective_selection.non_expander_bits() == 0 {
                    return false;
                }
            }
            !(item.is_expanded && !expander_selected)
        })
        .collect();

    if included.is_empty() {
        if request.kind == UpdateKind::Insertion && defaults.dismiss_if_empty {
            return UpdateResult::Dismiss;
        }
        // Empty but present: keep the filter bar so the user can adjust it.
        return UpdateResult::Updated(ListUpdate {
            items: Vec::new(),
            selection: Selection::NoSelection,
            unique_item: None,
            filters: filters::filter_rows(items, 0, effective_selection, expander_available),
        });
    }

    // Score every surviving candidate and sort by quality, breaking ties by
    // the original position.
    let mut matcher = if case_sensitive {
        FuzzyMatcher::case_sensitive(filter_text)
    } else {
        FuzzyMatcher::new(filter_text)
    };
    let mut results: Vec<MatchResult> = included
        .into_iter()
        .map(|(original_index, item)| {
            let (pattern_match, matched_additional_only) = compute_match(item, &mut matcher);
            MatchResult {
                matched_filter_text: pattern_match.is_some(),
                matched_additional_only,
                recent_index: recent.index_of(item.mru_key()),
                original_index,
                pattern_match,
                item: Arc::clone(item),
            }
        })
        .collect();
    results.sort_by(MatchResult::compare);

    let (visible_indices, mut selection, unique_item, selected_from_matches) = if deletion_session
    {
        match deletion_selection(&results, filter_text, request, suggestion_mode) {
            Ok((visible, selection)) => (visible, selection, None, false),
            Err(result) => return result,
        }
    } else {
        insertion_selection(&results, filter_text, suggestion_mode, custom_filter)
    };

    // A non-filter character typed mid-word aborts this update (the host keeps
    // the previous model) unless the best candidate declares it as a filter
    // character.
    if request.kind == UpdateKind::Insertion {
        if let Some(typed) = request.typed_char {
            let single_typed = {
                let mut chars = filter_text.chars();
                chars.next() == Some(typed) && chars.next().is_none()
            };
            if !filter_text.is_empty() && !single_typed && !is_potential_filter_char(typed) {
                let declared = match selection {
                    Selection::Candidate { index, .. } => results[visible_indices[index]]
                        .item
                        .filter_rules
                        .admits(typed, &[]),
                    _ => false,
                };
                if !declared {
                    return UpdateResult::Ignore;
                }
            }
        }
    }

    if selected_from_matches {
        if let Selection::Candidate { index, hard: _ } = selection {
            let r = &results[visible_indices[index]];
            let soften = suggestion_mode
                || (!filter_text.is_empty()
                    && filter_text.chars().all(|c| c.is_ascii_punctuation())
                    && filter_text != r.item.display_text)
                || (filter_text.is_empty()
                    && r.item.selection_behavior != SelectionBehavior::HardSelection
                    && r.item.match_priority == match_priority::DEFAULT)
                || !r.matched_filter_text;
            if soften {
                selection = Selection::Candidate { index, hard: false };
            }
        }
    }

    // Keep selection consistent with an external whole-line suggestion: with
    // nothing typed yet, the first external default inside the selected
    // match's equivalence class wins.
    if !deletion_session && !request.external_defaults.is_empty() && filter_text.is_empty() {
        if let Selection::Candidate { index, .. } = selection {
            let selected = &results[visible_indices[index]];
            if selected.item.match_priority < match_priority::PRESELECT {
                let found = visible_indices.iter().position(|&ri| {
                    let r = &results[ri];
                    r.same_match_class(selected)
                        && request
                            .external_defaults
                            .iter()
                            .any(|d| *d == r.item.display_text)
                });
                if let Some(found) = found {
                    selection = Selection::Candidate {
                        index: found,
                        hard: true,
                    };
                }
            }
        }
    }

    let visible: Vec<VisibleItem> = visible_indices
        .iter()
        .map(|&ri| {
            let r = &results[ri];
            let highlights = if filter_text.is_empty() {
                Vec::new()
            } else {
                highlight_spans(r, &mut matcher)
            };
            let display = display_cache
                .entry(r.item.id)
                .or_insert_with(|| Arc::from(r.item.full_display_text()))
                .clone();
            VisibleItem {
                item: Arc::clone(&r.item),
                display,
                highlights,
            }
        })
        .collect();

    let visible_bits = visible_indices
        .iter()
        .fold(0u32, |bits, &ri| bits | filters::bucket_bits(&results[ri].item));

    UpdateResult::Updated(ListUpdate {
        items: visible,
        selection,
        unique_item,
        filters: filters::filter_rows(items, visible_bits, effective_selection, expander_available),
    })
}

/// Selection strategy while the session is deleting: the best candidate keeps
/// the longest case-insensitive prefix of the filter text, with case-sensitive
/// length, match priority (hard candidates only), and provider preference as
/// tie-breaks. All surviving items stay visible.
fn deletion_selection(
    results: &[MatchResult],
    filter_text: &str,
    request: &UpdateRequest,
    suggestion_mode: bool,
) -> Result<(Vec<usize>, Selection), UpdateResult> {
    let visible: Vec<usize> = (0..results.len()).collect();

    struct Best {
        index: usize,
        ci: usize,
        cs: usize,
    }
    let mut best: Option<Best> = None;
    for (index, r) in results.iter().enumerate() {
        if !r.matched_filter_text {
            continue;
        }
        let ci = common_prefix_len(&r.item.filter_text, filter_text);
        let cs = common_prefix_len_exact(&r.item.filter_text, filter_text);
        let better = match &best {
            None => true,
            Some(b) => {
                if ci != b.ci {
                    ci > b.ci
                } else if cs != b.cs {
                    cs > b.cs
                } else {
                    let hard = ci == filter_text.len();
                    let current = &results[b.index].item;
                    if hard && r.item.match_priority != current.match_priority {
                        r.item.match_priority > current.match_priority
                    } else {
                        r.item.is_preferred && !current.is_preferred
                    }
                }
            }
        };
        if better {
            best = Some(Best { index, ci, cs });
        }
    }

    let selection = match best {
        // Deleting through a word keeps the word selected: hard only when the
        // matched prefix covers the entire filter text.
        Some(b) => Selection::Candidate {
            index: b.index,
            hard: b.ci == filter_text.len() && !suggestion_mode,
        },
        None => {
            if request.kind == UpdateKind::Insertion {
                return Err(UpdateResult::Dismiss);
            }
            if suggestion_mode {
                Selection::Suggestion
            } else if results.is_empty() {
                Selection::NoSelection
            } else {
                Selection::Candidate {
                    index: 0,
                    hard: false,
                }
            }
        }
    };
    Ok((visible, selection))
}

fn insertion_selection(
    results: &[MatchResult],
    filter_text: &str,
    suggestion_mode: bool,
    custom_filter: Option<&dyn MatchFilter>,
) -> (Vec<usize>, Selection, Option<Arc<CompletionItem>>, bool) {
    let filtered = match custom_filter {
        Some(f) => f.filter(results, filter_text),
        None => DefaultMatchFilter.filter(results, filter_text),
    };

    if filtered.is_empty() {
        // Nothing counts as a true match; keep everything visible and fall
        // back to the longest case-insensitive common prefix.
        let visible: Vec<usize> = (0..results.len()).collect();
        let selection = if suggestion_mode {
            Selection::Suggestion
        } else if results.is_empty() {
            Selection::NoSelection
        } else {
            let mut best = 0usize;
            let mut best_ci = common_prefix_len(&results[0].item.filter_text, filter_text);
            for (index, r) in results.iter().enumerate().skip(1) {
                let ci = common_prefix_len(&r.item.filter_text, filter_text);
                if ci > best_ci {
                    best = index;
                    best_ci = ci;
                }
            }
            Selection::Candidate {
                index: best,
                hard: false,
            }
        };
        return (visible, selection, None, false);
    }

    let mut best_pos = 0usize;
    for pos in 1..filtered.len() {
        if better_match(&results[filtered[pos]], &results[filtered[best_pos]]) {
            best_pos = pos;
        }
    }

    // Uniqueness ignores preferred (starred) duplicates of a plain item.
    let mut count = 0usize;
    let mut unique = None;
    for &i in &filtered {
        let r = &results[i];
        let is_preferred_duplicate = r.item.is_preferred
            && filtered.iter().any(|&j| {
                j != i
                    && !results[j].item.is_preferred
                    && results[j].item.display_text == r.item.display_text
            });
        if is_preferred_duplicate {
            continue;
        }
        count += 1;
        unique = Some(Arc::clone(&r.item));
    }
    let unique_item = if count == 1 && !filter_text.is_empty() {
        unique
    } else {
        None
    };

    (
        filtered,
        Selection::Candidate {
            index: best_pos,
            hard: true,
        },
        unique_item,
        true,
    )
}

/// Precedence for the best item among true matches. This exact order is a
/// product decision: recency first, then provider preference, then match
/// priority, then a primary-filter-text match over an additional one.
fn better_match(a: &MatchResult, b: &MatchResult) -> bool {
    if a.recent_index != b.recent_index {
        return a.recent_index > b.recent_index;
    }
    if a.item.is_preferred != b.item.is_preferred {
        return a.item.is_preferred;
    }
    if a.item.match_priority != b.item.match_priority {
        return a.item.match_priority > b.item.match_priority;
    }
    if a.matched_additional_only != b.matched_additional_only {
        return !a.matched_additional_only;
    }
    false
}

fn highlight_spans(r: &MatchResult, matcher: &mut FuzzyMatcher) -> Vec<TextRange> {
    let item = &r.item;
    let offset = item.display_text_prefix.len() as u32;
    let spans = if item.filter_text != item.display_text || !item.additional_filter_texts.is_empty()
    {
        // The stored match ran against a different text; redo it against what
        // the user actually sees.
        match matcher.score(&item.display_text) {
            Some(m) => m.spans,
            None => return Vec::new(),
        }
    } else {
        match &r.pattern_match {
            Some(m) => m.spans.clone(),
            None => return Vec::new(),
        }
    };
    if offset == 0 {
        return spans;
    }
    spans
        .iter()
        .map(|s| {
            TextRange::new(
                TextSize::from(u32::from(s.start()) + offset),
                TextSize::from(u32::from(s.end()) + offset),
            )
        })
        .collect()
}
