//! Completion session management for the Lumen editor shell.
//!
//! This crate bridges a language candidate provider to an asynchronous
//! completion UI. It owns the part that has to be fast and correct on every
//! keystroke: deciding which candidates remain visible, which one is selected
//! and how strongly, how filter buckets and the unimported-types expander
//! interact, and how the slower expanded-candidate computation is raced
//! against the interactive latency budget.
//!
//! Candidate production and scoring live behind [`CandidateProvider`]; text
//! buffers and rendering belong to the host. What remains is a state machine
//! per session:
//!
//! - [`CompletionSession::start`] computes and caches the candidate list and
//!   launches the expansion computation concurrently.
//! - [`CompletionSession::update`] re-derives the visible list from the cached
//!   candidates on every keystroke and opportunistically folds in the
//!   expansion result.
//! - [`CompletionSession::try_commit`] decides what a committing character
//!   does, honoring per-item character rules over language defaults.

#![forbid(unsafe_code)]

mod commit;
mod config;
mod expand;
mod filters;
mod item;
mod matching;
mod mru;
mod provider;
mod session;
mod update;

pub use commit::CommitOutcome;
pub use config::CompletionConfig;
pub use filters::{
    expander, filter_for_tag, filters, FilterId, FilterRow, FilterSelection, ItemFilter,
};
pub use item::{
    match_priority, CharacterRule, CharacterRules, CompletionItem, ItemId, ItemTag,
    SelectionBehavior,
};
pub use matching::{DefaultMatchFilter, MatchFilter, MatchResult};
pub use mru::RecentItems;
pub use provider::{
    CandidateBatch, CandidateProvider, CandidateRequest, CommitEdit, EnterKeyRule,
    LanguageDefaults, ProviderCapabilities, ProviderError, TriggerKind,
};
pub use session::{Cancelled, CompletionContext, CompletionSession, ViewScope};
pub use update::{ListUpdate, Selection, UpdateKind, UpdateRequest, UpdateResult, VisibleItem};
