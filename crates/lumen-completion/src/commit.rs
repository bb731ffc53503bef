//! Commit decision logic.
//!
//! Invoked only when a candidate-committing character arrives. Filter
//! characters win over commit characters, per-item rules win over the language
//! defaults, and every failure degrades to an unhandled result so the host can
//! recover without surfacing an error on the keystroke path.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use lumen_fuzzy::common_prefix_len;

use crate::item::CompletionItem;
use crate::mru::RecentItems;
use crate::provider::{
    CandidateProvider, CommitEdit, EnterKeyRule, LanguageDefaults, ProviderCapabilities,
    ProviderError,
};

/// Outcome of a commit attempt.
///
/// `Committed::suppress_character` distinguishes a commit that consumed the
/// typed character from one that should let it propagate to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The engine could not handle the commit; the host falls back.
    Unhandled,
    /// The character narrows the list instead; keep filtering.
    CancelCommit,
    /// Commit nothing and let the host retrigger completion for the character.
    VoidCommit,
    Committed {
        edit: CommitEdit,
        suppress_character: bool,
    },
}

/// Characters that commit regardless of per-item or language rules. Explicit
/// invocation (no character) is treated the same way.
fn is_universal_commit_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n')
}

/// A character is a filter character for `item` when the item's filter rules
/// say so, or, absent rules, when the text typed so far plus the character is
/// still a case-insensitive prefix of one of the item's texts.
pub(crate) fn is_filter_character(item: &CompletionItem, ch: char, filter_text: &str) -> bool {
    if !item.filter_rules.is_empty() {
        return item.filter_rules.admits(ch, &[]);
    }

    let mut typed = String::with_capacity(filter_text.len() + ch.len_utf8());
    typed.push_str(filter_text);
    typed.push(ch);

    std::iter::once(item.display_text.as_str())
        .chain(std::iter::once(item.filter_text.as_str()))
        .chain(item.additional_filter_texts.iter().map(String::as_str))
        .any(|text| common_prefix_len(text, &typed) == typed.len())
}

pub(crate) struct CommitRequest<'a> {
    pub item: &'a Arc<CompletionItem>,
    pub typed: Option<char>,
    pub filter_text: &'a str,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn try_commit(
    items: &[Arc<CompletionItem>],
    provider: &dyn CandidateProvider,
    capabilities: ProviderCapabilities,
    defaults: &LanguageDefaults,
    recent: &RecentItems,
    request: CommitRequest<'_>,
    token: &CancellationToken,
    reported_foreign_cancellation: &mut bool,
) -> CommitOutcome {
    let item = request.item;

    // The committed item must belong to this session. Anything else is a
    // programming error upstream; report it and recover.
    if !items.iter().any(|it| it.id == item.id) {
        tracing::error!(
            display_text = %item.display_text,
            "commit requested for an item outside the session"
        );
        return CommitOutcome::Unhandled;
    }

    if let Some(ch) = request.typed {
        if is_filter_character(item, ch, request.filter_text) {
            return CommitOutcome::CancelCommit;
        }

        // The character may be narrowing towards a different candidate; give
        // the update pipeline a chance to re-filter instead of committing the
        // wrong item.
        for other in items {
            if other.id == item.id {
                continue;
            }
            if common_prefix_len(&other.filter_text, request.filter_text)
                == request.filter_text.len()
                && is_filter_character(other, ch, request.filter_text)
            {
                return CommitOutcome::CancelCommit;
            }
        }

        if !is_universal_commit_char(ch)
            && !item.commit_rules.admits(ch, &defaults.commit_characters)
        {
            return CommitOutcome::VoidCommit;
        }
    }

    let edit = match provider.text_edit(item, request.typed) {
        Ok(edit) => edit,
        Err(ProviderError::Cancelled) => {
            if !token.is_cancelled() && !*reported_foreign_cancellation {
                *reported_foreign_cancellation = true;
                tracing::warn!("provider reported a cancellation not tied to the active token");
            }
            return CommitOutcome::Unhandled;
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to resolve the commit edit");
            return CommitOutcome::Unhandled;
        }
    };

    recent.record(item.mru_key());
    if capabilities.notifies_on_commit {
        provider.committed(item);
    }

    let suppress_character = if edit.commit_char_consumed {
        true
    } else if request.typed == Some('\n') {
        let pass_through = match defaults.enter_key_rule {
            EnterKeyRule::Never => false,
            EnterKeyRule::Always => true,
            EnterKeyRule::AfterFullyTypedWord => {
                request.filter_text.eq_ignore_ascii_case(&item.filter_text)
            }
        };
        !pass_through
    } else {
        false
    };

    CommitOutcome::Committed {
        edit,
        suppress_character,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{CharacterRule, CharacterRules, ItemId};
    use lumen_core::{TextEdit, TextRange, TextSize};

    struct EditOnlyProvider {
        consume_commit_char: bool,
    }

    impl CandidateProvider for EditOnlyProvider {
        fn candidates(
            &self,
            _request: &crate::provider::CandidateRequest,
        ) -> Result<crate::provider::CandidateBatch, ProviderError> {
            Ok(Default::default())
        }

        fn text_edit(
            &self,
            item: &CompletionItem,
            _commit_char: Option<char>,
        ) -> Result<CommitEdit, ProviderError> {
            Ok(CommitEdit {
                edit: TextEdit::new(
                    TextRange::new(TextSize::from(0), TextSize::from(0)),
                    item.display_text.clone(),
                ),
                additional_edits: Vec::new(),
                new_caret: None,
                commit_char_consumed: self.consume_commit_char,
            })
        }
    }

    fn commit(
        items: &[Arc<CompletionItem>],
        item: &Arc<CompletionItem>,
        typed: Option<char>,
        filter_text: &str,
        defaults: &LanguageDefaults,
    ) -> CommitOutcome {
        let provider = EditOnlyProvider {
            consume_commit_char: false,
        };
        let recent = RecentItems::new();
        let token = CancellationToken::new();
        let mut reported = false;
        try_commit(
            items,
            &provider,
            ProviderCapabilities::default(),
            defaults,
            &recent,
            CommitRequest {
                item,
                typed,
                filter_text,
            },
            &token,
            &mut reported,
        )
    }

    #[test]
    fn remove_rule_beats_default_commit_set() {
        let item = Arc::new(
            CompletionItem::new(ItemId(1), "Write").with_commit_rules(CharacterRules::new(vec![
                CharacterRule::Remove(vec!['.']),
                CharacterRule::Add(vec!['(']),
            ])),
        );
        let items = vec![Arc::clone(&item)];
        let defaults = LanguageDefaults {
            commit_characters: vec!['.'],
            ..Default::default()
        };

        assert_eq!(
            commit(&items, &item, Some('.'), "Writ", &defaults),
            CommitOutcome::VoidCommit
        );
        assert!(matches!(
            commit(&items, &item, Some('('), "Writ", &defaults),
            CommitOutcome::Committed { .. }
        ));
    }

    #[test]
    fn filter_character_cancels_the_commit() {
        let item = Arc::new(CompletionItem::new(ItemId(1), "Where"));
        let items = vec![Arc::clone(&item)];
        // 'e' extends "Wh" into a prefix of "Where": filtering wins.
        assert_eq!(
            commit(&items, &item, Some('e'), "Wh", &LanguageDefaults::default()),
            CommitOutcome::CancelCommit
        );
    }

    #[test]
    fn filter_character_of_another_candidate_cancels_too() {
        let selected = Arc::new(CompletionItem::new(ItemId(1), "Con"));
        let other = Arc::new(CompletionItem::new(ItemId(2), "Const"));
        let items = vec![Arc::clone(&selected), Arc::clone(&other)];
        // 's' is not a filter char for "Con" but narrows towards "Const".
        assert_eq!(
            commit(
                &items,
                &selected,
                Some('s'),
                "Con",
                &LanguageDefaults::default()
            ),
            CommitOutcome::CancelCommit
        );
    }

    #[test]
    fn undeclared_character_is_a_void_commit() {
        let item = Arc::new(CompletionItem::new(ItemId(1), "Write"));
        let items = vec![Arc::clone(&item)];
        let defaults = LanguageDefaults {
            commit_characters: vec![';'],
            ..Default::default()
        };
        assert_eq!(
            commit(&items, &item, Some('#'), "Write", &defaults),
            CommitOutcome::VoidCommit
        );
    }

    #[test]
    fn tab_commits_regardless_of_rules() {
        let item = Arc::new(CompletionItem::new(ItemId(1), "Write").with_commit_rules(
            CharacterRules::new(vec![CharacterRule::Replace(Vec::new())]),
        ));
        let items = vec![Arc::clone(&item)];
        assert!(matches!(
            commit(&items, &item, Some('\t'), "Write", &LanguageDefaults::default()),
            CommitOutcome::Committed { .. }
        ));
    }

    #[test]
    fn newline_propagation_follows_the_enter_rule() {
        let item = Arc::new(CompletionItem::new(ItemId(1), "Write"));
        let items = vec![Arc::clone(&item)];

        let never = LanguageDefaults::default();
        match commit(&items, &item, Some('\n'), "Writ", &never) {
            CommitOutcome::Committed {
                suppress_character, ..
            } => assert!(suppress_character),
            other => panic!("unexpected outcome {other:?}"),
        }

        let fully_typed = LanguageDefaults {
            enter_key_rule: EnterKeyRule::AfterFullyTypedWord,
            ..Default::default()
        };
        match commit(&items, &item, Some('\n'), "Write", &fully_typed) {
            CommitOutcome::Committed {
                suppress_character, ..
            } => assert!(!suppress_character, "fully typed word passes enter through"),
            other => panic!("unexpected outcome {other:?}"),
        }
        match commit(&items, &item, Some('\n'), "Writ", &fully_typed) {
            CommitOutcome::Committed {
                suppress_character, ..
            } => assert!(suppress_character),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn foreign_item_is_unhandled() {
        let item = Arc::new(CompletionItem::new(ItemId(1), "Write"));
        let stranger = Arc::new(CompletionItem::new(ItemId(99), "Stranger"));
        let items = vec![item];
        assert_eq!(
            commit(&items, &stranger, None, "", &LanguageDefaults::default()),
            CommitOutcome::Unhandled
        );
    }

    #[test]
    fn explicit_invoke_commits_without_a_character() {
        let item = Arc::new(CompletionItem::new(ItemId(1), "Write"));
        let items = vec![Arc::clone(&item)];
        assert!(matches!(
            commit(&items, &item, None, "Wri", &LanguageDefaults::default()),
            CommitOutcome::Committed { .. }
        ));
    }
}
