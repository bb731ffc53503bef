//! The language candidate provider boundary.
//!
//! The provider is a black box: it produces scored candidates and resolves
//! commit edits. Everything it can optionally do is declared up front through
//! [`ProviderCapabilities`], resolved once at session start.

use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use lumen_core::{TextEdit, TextSize};

use crate::item::CompletionItem;
use crate::matching::MatchFilter;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// No language service participates at this position.
    #[error("no completion provider available at this position")]
    Unavailable,
    #[error("completion request cancelled")]
    Cancelled,
    #[error("completion provider error: {0}")]
    Failed(String),
}

/// What happens to a newline typed while the committed word is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnterKeyRule {
    /// The newline is consumed by the commit.
    #[default]
    Never,
    /// The newline always propagates to the host after the commit.
    Always,
    /// The newline propagates only when the word was fully typed.
    AfterFullyTypedWord,
}

/// Language-level defaults that per-item rules override.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageDefaults {
    pub commit_characters: Vec<char>,
    pub enter_key_rule: EnterKeyRule,
    /// Dismiss the session when filtering leaves no visible item.
    pub dismiss_if_empty: bool,
    /// Dismiss when backspacing erases all text typed since the session began.
    pub dismiss_if_last_character_deleted: bool,
}

impl Default for LanguageDefaults {
    fn default() -> Self {
        Self {
            commit_characters: vec![
                ' ', '.', ';', ',', '(', ')', '[', ']', '{', '}', ':', '=',
            ],
            enter_key_rule: EnterKeyRule::Never,
            dismiss_if_empty: false,
            dismiss_if_last_character_deleted: false,
        }
    }
}

/// Optional provider behaviors, resolved once when the session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// The provider can compute expanded (unimported-namespace) candidates.
    pub supports_expansion: bool,
    /// The provider wants a notification after each successful commit.
    pub notifies_on_commit: bool,
    /// The provider supplies its own match-filter strategy via
    /// [`CandidateProvider::match_filter`].
    pub custom_match_filter: bool,
}

/// What started the session or a candidate computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Explicit invocation (e.g. ctrl+space).
    Invoke,
    /// A character was typed.
    Insertion(char),
    /// A character was deleted.
    Deletion(char),
    Other,
}

#[derive(Debug, Clone)]
pub struct CandidateRequest {
    pub position: TextSize,
    pub trigger: TriggerKind,
}

/// The provider's answer to a candidate computation.
#[derive(Debug, Clone, Default)]
pub struct CandidateBatch {
    /// Pre-sorted by the provider; the session never re-sorts the raw list.
    pub items: Vec<CompletionItem>,
    /// Placeholder for suggestion ("builder") mode, when active.
    pub suggestion: Option<CompletionItem>,
    /// The results should not be supplemented by the expanded computation.
    pub is_exclusive: bool,
    /// The batch did not come from a language service (e.g. plain-text words);
    /// the case-sensitive matching mode applies only to such batches.
    pub is_non_language: bool,
    pub defaults: LanguageDefaults,
}

/// The edit a commit applies, resolved by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEdit {
    pub edit: TextEdit,
    pub additional_edits: Vec<TextEdit>,
    pub new_caret: Option<TextSize>,
    /// The typed commit character was incorporated into the edit.
    pub commit_char_consumed: bool,
}

pub trait CandidateProvider: Send + Sync + 'static {
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    /// Compute the primary candidate set. Runs on a worker thread; the session
    /// awaits it once and caches the result.
    fn candidates(&self, request: &CandidateRequest) -> Result<CandidateBatch, ProviderError>;

    /// Compute the expanded (unimported-namespace) candidate set. Only invoked
    /// when [`ProviderCapabilities::supports_expansion`] is set. The returned
    /// items must already be in final order; the merge does not re-sort.
    fn expanded_candidates(
        &self,
        request: CandidateRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<CandidateBatch, ProviderError>> {
        let _ = (request, cancel);
        Box::pin(futures::future::ready(Err(ProviderError::Unavailable)))
    }

    /// Resolve the text edit committing `item`.
    fn text_edit(
        &self,
        item: &CompletionItem,
        commit_char: Option<char>,
    ) -> Result<CommitEdit, ProviderError>;

    /// Post-commit notification; only called when
    /// [`ProviderCapabilities::notifies_on_commit`] is set.
    fn committed(&self, item: &CompletionItem) {
        let _ = item;
    }

    /// Provider-specific match reduction; only consulted when
    /// [`ProviderCapabilities::custom_match_filter`] is set.
    fn match_filter(&self) -> Option<Arc<dyn MatchFilter>> {
        None
    }
}
