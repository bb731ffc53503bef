//! The background expansion racing protocol.
//!
//! Expanded (unimported-namespace) candidates are slow to compute, so the
//! computation is launched concurrently with the primary one and folded in
//! opportunistically. The session polls readiness on each refresh instead of
//! waiting, unless responsive mode is off.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::provider::{CandidateBatch, CandidateProvider, CandidateRequest, ProviderError};

/// Progress of the expanded-candidate computation for one session.
///
/// `Merged` and `Disabled` are terminal: once the secondary results are folded
/// into the combined list the computation is never polled again, and an
/// exclusive primary result forces `Disabled` without ever merging.
pub(crate) enum ExpansionState {
    NotStarted,
    Pending(ExpansionTask),
    Merged,
    Disabled,
}

/// Handle to the in-flight secondary computation. At most one is outstanding
/// per session; a newer generation cancels its predecessor.
pub(crate) struct ExpansionTask {
    pub(crate) generation: u64,
    token: CancellationToken,
    handle: tokio::task::JoinHandle<Result<CandidateBatch, ProviderError>>,
}

impl ExpansionTask {
    pub(crate) fn spawn(
        provider: &Arc<dyn CandidateProvider>,
        request: CandidateRequest,
        generation: u64,
    ) -> Self {
        let token = CancellationToken::new();
        let future = provider.expanded_candidates(request, token.clone());
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => Err(ProviderError::Cancelled),
                result = future => result,
            }
        });
        Self {
            generation,
            token,
            handle,
        }
    }

    /// Non-blocking readiness probe used by the per-refresh merge check.
    pub(crate) fn is_ready(&self) -> bool {
        self.handle.is_finished()
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
        self.handle.abort();
    }

    /// Wait for the computation. Resolves immediately when [`is_ready`] was
    /// already true.
    ///
    /// [`is_ready`]: Self::is_ready
    pub(crate) async fn wait(&mut self) -> Result<CandidateBatch, ProviderError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                self.handle.abort();
                Err(ProviderError::Cancelled)
            }
            result = &mut self.handle => match result {
                Ok(result) => result,
                Err(err) if err.is_cancelled() => Err(ProviderError::Cancelled),
                Err(_) => {
                    tracing::error!("expansion computation panicked");
                    Err(ProviderError::Failed("expansion computation panicked".into()))
                }
            }
        }
    }
}

/// Whether this refresh should pay the cost of the merge check at all. The
/// expanded items only matter once the user has typed enough to want them, is
/// completing a member access, or an external default could reference them.
pub(crate) fn merge_wanted(
    filter_text: &str,
    span_starts_after_dot: bool,
    has_external_defaults: bool,
) -> bool {
    filter_text.chars().count() >= 2 || span_starts_after_dot || has_external_defaults
}
