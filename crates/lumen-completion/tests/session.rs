//! Session-level scenarios: the expansion race, merging, commits, and the
//! recency bias shared across sessions of one view.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use lumen_completion::{
    expander, CandidateBatch, CandidateProvider, CandidateRequest, CommitEdit, CommitOutcome,
    CompletionConfig, CompletionContext, CompletionItem, CompletionSession, ItemId,
    ProviderCapabilities, ProviderError, Selection, TriggerKind, UpdateRequest, UpdateResult,
    ViewScope,
};
use lumen_core::{TextEdit, TextRange, TextSize};

struct ScriptedProvider {
    batch: CandidateBatch,
    expanded: Option<CandidateBatch>,
    /// When set, the expansion computation completes only after a notify.
    gate: Option<Arc<Notify>>,
    capabilities: ProviderCapabilities,
    unavailable: bool,
}

impl ScriptedProvider {
    fn new(batch: CandidateBatch) -> Self {
        Self {
            batch,
            expanded: None,
            gate: None,
            capabilities: ProviderCapabilities::default(),
            unavailable: false,
        }
    }

    fn with_expansion(mut self, expanded: CandidateBatch, gate: Option<Arc<Notify>>) -> Self {
        self.expanded = Some(expanded);
        self.gate = gate;
        self.capabilities.supports_expansion = true;
        self
    }
}

impl CandidateProvider for ScriptedProvider {
    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    fn candidates(&self, _request: &CandidateRequest) -> Result<CandidateBatch, ProviderError> {
        if self.unavailable {
            return Err(ProviderError::Unavailable);
        }
        Ok(self.batch.clone())
    }

    fn expanded_candidates(
        &self,
        _request: CandidateRequest,
        cancel: tokio_util::sync::CancellationToken,
    ) -> BoxFuture<'static, Result<CandidateBatch, ProviderError>> {
        let gate = self.gate.clone();
        let batch = self.expanded.clone();
        async move {
            if let Some(gate) = gate {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                    _ = gate.notified() => {}
                }
            }
            batch.ok_or(ProviderError::Unavailable)
        }
        .boxed()
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
            commit_char_consumed: false,
        })
    }
}

fn item(id: u64, text: &str) -> CompletionItem {
    CompletionItem::new(ItemId(id), text)
}

fn batch(items: Vec<CompletionItem>) -> CandidateBatch {
    CandidateBatch {
        items,
        ..Default::default()
    }
}

fn empty_span() -> TextRange {
    TextRange::new(TextSize::from(0), TextSize::from(0))
}

async fn start(
    provider: ScriptedProvider,
    config: CompletionConfig,
    scope: &ViewScope,
) -> (CompletionSession, CompletionContext) {
    let token = CancellationToken::new();
    CompletionSession::start(
        Arc::new(provider) as Arc<dyn CandidateProvider>,
        config,
        scope,
        CandidateRequest {
            position: TextSize::from(0),
            trigger: TriggerKind::Insertion('C'),
        },
        empty_span(),
        &token,
    )
    .await
    .expect("start is not cancelled")
    .expect("provider participates")
}

fn selected_text(result: &UpdateResult) -> String {
    let update = result.updated().expect("expected an updated list");
    match update.selection {
        Selection::Candidate { index, .. } => update.items[index].item.display_text.clone(),
        other => panic!("expected a candidate selection, got {other:?}"),
    }
}

#[tokio::test]
async fn expansion_merges_exactly_once_in_responsive_mode() {
    let gate = Arc::new(Notify::new());
    let provider = ScriptedProvider::new(batch(vec![item(1, "Console"), item(2, "ConsoleColor")]))
        .with_expansion(batch(vec![item(10, "ConsoleKit")]), Some(gate.clone()));
    let scope = ViewScope::new();
    let (mut session, context) = start(provider, CompletionConfig::default(), &scope).await;
    assert_eq!(context.items.len(), 2);

    let token = CancellationToken::new();

    // Second keystroke: the computation is still pending and responsive mode
    // refuses to wait, so only primary items come back.
    let result = session
        .update(&UpdateRequest::insertion("Co", 'o'), &token)
        .await
        .unwrap();
    assert_eq!(result.updated().unwrap().items.len(), 2);
    assert!(!session.is_merged());

    // Let the background computation finish.
    gate.notify_one();
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    // Third keystroke folds the expanded items in.
    let result = session
        .update(&UpdateRequest::insertion("Con", 'n'), &token)
        .await
        .unwrap();
    let update = result.updated().unwrap();
    assert!(session.is_merged());
    assert_eq!(update.items.len(), 3);
    let row = update
        .filters
        .iter()
        .find(|row| row.filter == expander())
        .expect("expander row present");
    assert!(row.selected && row.available);

    // Merged is terminal: the combined list is reused, never rebuilt.
    let echoed = UpdateRequest::insertion("Con", 'n')
        .with_selection([expander()].into_iter().collect());
    let result = session.update(&echoed, &token).await.unwrap();
    assert_eq!(result.updated().unwrap().items.len(), 3);
    assert_eq!(session.items().len(), 3);
}

#[tokio::test]
async fn short_filter_text_skips_the_merge_check() {
    let provider = ScriptedProvider::new(batch(vec![item(1, "Console")]))
        .with_expansion(batch(vec![item(10, "ConsoleKit")]), None);
    let scope = ViewScope::new();
    let (mut session, _) = start(provider, CompletionConfig::default(), &scope).await;

    // The computation completes immediately, but a one-character filter does
    // not even probe for it.
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    let token = CancellationToken::new();
    let result = session
        .update(&UpdateRequest::insertion("C", 'C'), &token)
        .await
        .unwrap();
    assert_eq!(result.updated().unwrap().items.len(), 1);
    assert!(!session.is_merged());

    let result = session
        .update(&UpdateRequest::insertion("Co", 'o'), &token)
        .await
        .unwrap();
    assert!(session.is_merged());
    assert_eq!(result.updated().unwrap().items.len(), 2);
}

#[tokio::test]
async fn blocking_mode_awaits_the_expansion() {
    let gate = Arc::new(Notify::new());
    let provider = ScriptedProvider::new(batch(vec![item(1, "Console")]))
        .with_expansion(batch(vec![item(10, "ConsoleKit")]), Some(gate.clone()));
    let scope = ViewScope::new();
    let config = CompletionConfig {
        responsive_mode: false,
        ..Default::default()
    };
    let (mut session, _) = start(provider, config, &scope).await;

    // The permit is stored before the update, so the blocking wait resolves.
    gate.notify_one();
    let token = CancellationToken::new();
    let result = session
        .update(&UpdateRequest::insertion("Co", 'o'), &token)
        .await
        .unwrap();
    assert!(session.is_merged());
    assert_eq!(result.updated().unwrap().items.len(), 2);
}

#[tokio::test]
async fn exclusive_primary_results_disable_expansion() {
    let mut primary = batch(vec![item(1, "Console")]);
    primary.is_exclusive = true;
    let provider =
        ScriptedProvider::new(primary).with_expansion(batch(vec![item(10, "ConsoleKit")]), None);
    let scope = ViewScope::new();
    let (mut session, _) = start(provider, CompletionConfig::default(), &scope).await;

    let token = CancellationToken::new();
    let result = session
        .update(&UpdateRequest::insertion("Con", 'n'), &token)
        .await
        .unwrap();
    assert!(!session.is_merged());
    assert_eq!(result.updated().unwrap().items.len(), 1);
    assert!(session.expanded_context(&token).await.unwrap().is_empty());
}

#[tokio::test]
async fn explicit_expander_invocation_waits_and_merges() {
    let provider = ScriptedProvider::new(batch(vec![item(1, "Console")]))
        .with_expansion(batch(vec![item(10, "ConsoleKit")]), None);
    let scope = ViewScope::new();
    let (mut session, _) = start(provider, CompletionConfig::default(), &scope).await;

    let token = CancellationToken::new();
    let added = session.expanded_context(&token).await.unwrap();
    assert_eq!(added.len(), 1);
    assert!(added[0].is_expanded);
    assert!(session.is_merged());

    // Invoking again is a no-op: the merge never repeats.
    assert!(session.expanded_context(&token).await.unwrap().is_empty());
    assert_eq!(session.items().len(), 2);
}

#[tokio::test]
async fn committed_items_bias_later_sessions_in_the_same_scope() {
    let scope = ViewScope::new();
    let items = vec![item(1, "Console"), item(2, "ConsoleColor")];

    let (mut session, context) = start(
        ScriptedProvider::new(batch(items.clone())),
        CompletionConfig::default(),
        &scope,
    )
    .await;
    let token = CancellationToken::new();
    let color = Arc::clone(&context.items[1]);
    let outcome = session.try_commit(&color, None, "ConsoleColor", &token);
    assert!(matches!(outcome, CommitOutcome::Committed { .. }));
    drop(session);

    // A new session in the same view scope sees the recency bias.
    let (mut session, _) = start(
        ScriptedProvider::new(batch(items)),
        CompletionConfig::default(),
        &scope,
    )
    .await;
    let result = session
        .update(&UpdateRequest::insertion("Con", 'n'), &token)
        .await
        .unwrap();
    assert_eq!(selected_text(&result), "ConsoleColor");
}

#[tokio::test]
async fn should_commit_consults_defaults_and_item_rules() {
    use lumen_completion::{CharacterRule, CharacterRules, LanguageDefaults};

    let special = item(2, "Write").with_commit_rules(CharacterRules::new(vec![
        CharacterRule::Add(vec!['!']),
    ]));
    let mut primary = batch(vec![item(1, "Console"), special]);
    primary.defaults = LanguageDefaults {
        commit_characters: vec!['.', ';'],
        ..Default::default()
    };
    let scope = ViewScope::new();
    let (session, _) = start(
        ScriptedProvider::new(primary),
        CompletionConfig::default(),
        &scope,
    )
    .await;

    assert!(session.should_commit('.'));
    assert!(session.should_commit(';'));
    assert!(session.should_commit('!'), "item rules extend the set");
    assert!(session.should_commit('\t'));
    assert!(session.should_commit('\n'));
    assert!(!session.should_commit('q'));
}

#[tokio::test]
async fn typing_a_number_dismisses_the_session() {
    let scope = ViewScope::new();
    let (mut session, _) = start(
        ScriptedProvider::new(batch(vec![item(1, "Console")])),
        CompletionConfig::default(),
        &scope,
    )
    .await;
    let token = CancellationToken::new();
    let result = session
        .update(&UpdateRequest::insertion("5", '5'), &token)
        .await
        .unwrap();
    assert!(matches!(result, UpdateResult::Dismiss));
}

#[tokio::test]
async fn unavailable_provider_does_not_participate() {
    let mut provider = ScriptedProvider::new(batch(Vec::new()));
    provider.unavailable = true;
    let token = CancellationToken::new();
    let outcome = CompletionSession::start(
        Arc::new(provider) as Arc<dyn CandidateProvider>,
        CompletionConfig::default(),
        &ViewScope::new(),
        CandidateRequest {
            position: TextSize::from(0),
            trigger: TriggerKind::Invoke,
        },
        empty_span(),
        &token,
    )
    .await
    .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn cancelled_update_leaves_the_session_usable() {
    let scope = ViewScope::new();
    let (mut session, _) = start(
        ScriptedProvider::new(batch(vec![item(1, "Console")])),
        CompletionConfig::default(),
        &scope,
    )
    .await;

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(session
        .update(&UpdateRequest::insertion("Con", 'n'), &cancelled)
        .await
        .is_err());

    let token = CancellationToken::new();
    let result = session
        .update(&UpdateRequest::insertion("Con", 'n'), &token)
        .await
        .unwrap();
    assert_eq!(selected_text(&result), "Console");
}
