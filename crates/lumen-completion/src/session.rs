//! Per-session state and the operations exposed to the host shell.
//!
//! All user-visible state transitions happen on one interactive sequence; the
//! provider's candidate computations run on workers and are raced against the
//! caller's cancellation token. A cancelled operation leaves the session
//! unmodified.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use lumen_core::TextRange;

use crate::commit::{self, CommitOutcome, CommitRequest};
use crate::config::CompletionConfig;
use crate::expand::{merge_wanted, ExpansionState, ExpansionTask};
use crate::filters::{self, FilterRow, FilterSelection};
use crate::item::{CompletionItem, ItemId};
use crate::matching::MatchFilter;
use crate::mru::RecentItems;
use crate::provider::{
    CandidateBatch, CandidateProvider, CandidateRequest, LanguageDefaults, ProviderCapabilities,
    ProviderError, TriggerKind,
};
use crate::update::{compute_update, UpdateInput, UpdateRequest, UpdateResult};

/// Marker for a superseded interactive operation. Expected, never a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// State shared by every completion session within one host view.
#[derive(Clone, Default)]
pub struct ViewScope {
    pub recent: RecentItems,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The initial candidate context handed to the host when a session starts.
pub struct CompletionContext {
    pub items: Vec<Arc<CompletionItem>>,
    pub suggestion: Option<Arc<CompletionItem>>,
    pub filters: Vec<FilterRow>,
    pub applicable_span: TextRange,
}

/// One active completion session: the cached candidate lists, the expansion
/// state machine, and everything commits need.
pub struct CompletionSession {
    provider: Arc<dyn CandidateProvider>,
    config: CompletionConfig,
    recent: RecentItems,
    capabilities: ProviderCapabilities,
    custom_filter: Option<Arc<dyn MatchFilter>>,
    initial_trigger: TriggerKind,
    applicable_span: TextRange,
    request: CandidateRequest,
    /// The original sorted candidate list, computed once and cached.
    primary: Vec<Arc<CompletionItem>>,
    /// Primary plus expanded items, once the merge has happened.
    combined: Option<Vec<Arc<CompletionItem>>>,
    suggestion: Option<Arc<CompletionItem>>,
    defaults: LanguageDefaults,
    is_non_language: bool,
    expansion: ExpansionState,
    next_expansion_generation: u64,
    potential_commit_chars: HashSet<char>,
    /// Derived display strings, keyed by item id and dropped with the session.
    display_cache: HashMap<ItemId, Arc<str>>,
    reported_foreign_cancellation: bool,
}

impl CompletionSession {
    /// Ask the provider to participate at `request.position`.
    ///
    /// Returns `Ok(None)` when no provider participates. Otherwise the session
    /// is created with the primary candidate list cached, and the expansion
    /// computation is launched concurrently when the feature is enabled and
    /// the primary results are not exclusive.
    pub async fn start(
        provider: Arc<dyn CandidateProvider>,
        config: CompletionConfig,
        scope: &ViewScope,
        request: CandidateRequest,
        applicable_span: TextRange,
        token: &CancellationToken,
    ) -> Result<Option<(CompletionSession, CompletionContext)>, Cancelled> {
        if token.is_cancelled() {
            return Err(Cancelled);
        }

        let worker = {
            let provider = Arc::clone(&provider);
            let request = request.clone();
            tokio::task::spawn_blocking(move || provider.candidates(&request))
        };
        let batch = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Cancelled),
            joined = worker => match joined {
                Ok(Ok(batch)) => batch,
                Ok(Err(ProviderError::Unavailable)) => return Ok(None),
                Ok(Err(ProviderError::Cancelled)) => {
                    if !token.is_cancelled() {
                        tracing::warn!(
                            "provider reported a cancellation not tied to the active token"
                        );
                    }
                    return Ok(None);
                }
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "primary candidate computation failed");
                    return Ok(None);
                }
                Err(_) => {
                    tracing::error!("primary candidate computation panicked");
                    return Ok(None);
                }
            }
        };

        let CandidateBatch {
            items,
            suggestion,
            is_exclusive,
            is_non_language,
            defaults,
        } = batch;
        let capabilities = provider.capabilities();
        let custom_filter = if capabilities.custom_match_filter {
            provider.match_filter()
        } else {
            None
        };
        let primary: Vec<Arc<CompletionItem>> = items.into_iter().map(Arc::new).collect();

        let mut session = CompletionSession {
            recent: scope.recent.clone(),
            potential_commit_chars: potential_commit_chars(&defaults, &primary),
            defaults,
            is_non_language,
            expansion: ExpansionState::NotStarted,
            next_expansion_generation: 0,
            suggestion: suggestion.map(Arc::new),
            primary,
            combined: None,
            capabilities,
            custom_filter,
            initial_trigger: request.trigger,
            applicable_span,
            request,
            provider,
            config,
            display_cache: HashMap::new(),
            reported_foreign_cancellation: false,
        };

        if is_exclusive {
            // The primary results must not be supplemented.
            session.expansion = ExpansionState::Disabled;
        } else if session.config.expansion_enabled && capabilities.supports_expansion {
            session.launch_expansion();
        }

        let filters = filters::filter_rows(
            &session.primary,
            filters::universe_bits(&session.primary),
            FilterSelection::EMPTY,
            session.expander_available(),
        );
        let context = CompletionContext {
            items: session.primary.clone(),
            suggestion: session.suggestion.clone(),
            filters,
            applicable_span,
        };
        Ok(Some((session, context)))
    }

    /// Re-derive the visible list after a keystroke or filter toggle.
    ///
    /// This is also where the racing protocol advances: a completed expansion
    /// computation is folded in exactly once, a pending one is either skipped
    /// (responsive mode) or awaited (blocking mode), and the merge-wanted
    /// heuristic avoids even the readiness probe while the filter text is too
    /// short to care.
    pub async fn update(
        &mut self,
        request: &UpdateRequest,
        token: &CancellationToken,
    ) -> Result<UpdateResult, Cancelled> {
        if token.is_cancelled() {
            return Err(Cancelled);
        }

        let wanted = merge_wanted(
            &request.filter_text,
            request.span_starts_after_dot,
            !request.external_defaults.is_empty(),
        );
        let poll = match &self.expansion {
            ExpansionState::Pending(task) if wanted => {
                task.is_ready() || !self.config.responsive_mode
            }
            _ => false,
        };
        let merged_this_round = if poll {
            self.await_and_merge(token).await?.is_some()
        } else {
            false
        };

        let mut effective_selection = request.selection;
        if merged_this_round {
            // The freshly merged expander reports itself selected; the host
            // echoes this state back on subsequent updates.
            effective_selection.insert(filters::expander());
        }

        let suggestion_mode = self.suggestion.is_some();
        let deletion_session = matches!(self.initial_trigger, TriggerKind::Deletion(_));
        let started_on_insertion = matches!(self.initial_trigger, TriggerKind::Insertion(_));
        let expander_available = self.expander_available();
        let case_sensitive = self.is_non_language && self.config.case_sensitive_non_language;

        Ok(compute_update(UpdateInput {
            items: self.combined.as_deref().unwrap_or(&self.primary),
            suggestion_mode,
            request,
            effective_selection,
            deletion_session,
            started_on_insertion,
            expander_available,
            recent: &self.recent,
            defaults: &self.defaults,
            case_sensitive,
            custom_filter: self.custom_filter.as_deref(),
            display_cache: &mut self.display_cache,
        }))
    }

    /// Explicit expander invocation: launch the computation when none is in
    /// flight, wait for it, merge, and return the supplemental items. Returns
    /// an empty list when expansion is unsupported, failed, or already merged.
    pub async fn expanded_context(
        &mut self,
        token: &CancellationToken,
    ) -> Result<Vec<Arc<CompletionItem>>, Cancelled> {
        if token.is_cancelled() {
            return Err(Cancelled);
        }
        match self.expansion {
            ExpansionState::Merged | ExpansionState::Disabled => return Ok(Vec::new()),
            ExpansionState::NotStarted => {
                if !self.capabilities.supports_expansion {
                    return Ok(Vec::new());
                }
                self.launch_expansion();
            }
            ExpansionState::Pending(_) => {}
        }
        Ok(self.await_and_merge(token).await?.unwrap_or_default())
    }

    /// Coarse pre-filter: can this character possibly commit the session?
    pub fn should_commit(&self, typed: char) -> bool {
        typed == '\t' || typed == '\n' || self.potential_commit_chars.contains(&typed)
    }

    /// Decide what a candidate-committing character does to `item`.
    pub fn try_commit(
        &mut self,
        item: &Arc<CompletionItem>,
        typed: Option<char>,
        filter_text: &str,
        token: &CancellationToken,
    ) -> CommitOutcome {
        commit::try_commit(
            self.combined.as_deref().unwrap_or(&self.primary),
            self.provider.as_ref(),
            self.capabilities,
            &self.defaults,
            &self.recent,
            CommitRequest {
                item,
                typed,
                filter_text,
            },
            token,
            &mut self.reported_foreign_cancellation,
        )
    }

    /// The candidate list updates are currently derived from.
    pub fn items(&self) -> &[Arc<CompletionItem>] {
        self.combined.as_deref().unwrap_or(&self.primary)
    }

    pub fn suggestion(&self) -> Option<&Arc<CompletionItem>> {
        self.suggestion.as_ref()
    }

    pub fn applicable_span(&self) -> TextRange {
        self.applicable_span
    }

    pub fn defaults(&self) -> &LanguageDefaults {
        &self.defaults
    }

    pub fn is_merged(&self) -> bool {
        matches!(self.expansion, ExpansionState::Merged)
    }

    fn launch_expansion(&mut self) {
        if let ExpansionState::Pending(task) = &self.expansion {
            task.cancel();
        }
        let generation = self.next_expansion_generation;
        self.next_expansion_generation += 1;
        let task = ExpansionTask::spawn(&self.provider, self.request.clone(), generation);
        tracing::debug!(generation = task.generation, "launching expansion computation");
        self.expansion = ExpansionState::Pending(task);
    }

    /// Take the pending task, wait for it, and fold the result in. Returns the
    /// appended items on success, `None` when the computation failed or was
    /// superseded. Cancellation of the caller restores the pending state.
    async fn await_and_merge(
        &mut self,
        token: &CancellationToken,
    ) -> Result<Option<Vec<Arc<CompletionItem>>>, Cancelled> {
        let ExpansionState::Pending(mut task) =
            mem::replace(&mut self.expansion, ExpansionState::Disabled)
        else {
            return Ok(None);
        };

        let result = {
            let wait = task.wait();
            tokio::pin!(wait);
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = &mut wait => Some(result),
            }
        };
        match result {
            None => {
                self.expansion = ExpansionState::Pending(task);
                Err(Cancelled)
            }
            Some(Ok(batch)) => Ok(Some(self.merge(batch))),
            Some(Err(ProviderError::Cancelled)) => Ok(None),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "expansion computation failed");
                Ok(None)
            }
        }
    }

    /// Fold the expansion result into the combined list. Expanded items sort
    /// after all primary items and arrive pre-sorted; no re-sort happens here.
    /// The pending handle was consumed by the caller, so the merge can never
    /// repeat.
    fn merge(&mut self, batch: CandidateBatch) -> Vec<Arc<CompletionItem>> {
        let expanded: Vec<Arc<CompletionItem>> = batch
            .items
            .into_iter()
            .map(|mut item| {
                item.is_expanded = true;
                Arc::new(item)
            })
            .collect();
        for item in &expanded {
            self.potential_commit_chars
                .extend(item.commit_rules.explicitly_admitted());
        }
        let mut combined = self.primary.clone();
        combined.extend(expanded.iter().cloned());
        self.combined = Some(combined);
        self.expansion = ExpansionState::Merged;
        expanded
    }

    fn expander_available(&self) -> bool {
        match self.expansion {
            ExpansionState::Pending(_) | ExpansionState::Merged => true,
            ExpansionState::NotStarted => self.capabilities.supports_expansion,
            ExpansionState::Disabled => false,
        }
    }
}

impl Drop for CompletionSession {
    fn drop(&mut self) {
        if let ExpansionState::Pending(task) = &self.expansion {
            task.cancel();
        }
    }
}

fn potential_commit_chars(
    defaults: &LanguageDefaults,
    items: &[Arc<CompletionItem>],
) -> HashSet<char> {
    let mut chars: HashSet<char> = defaults.commit_characters.iter().copied().collect();
    for item in items {
        chars.extend(item.commit_rules.explicitly_admitted());
    }
    chars
}
