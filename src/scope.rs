use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// Why a boundary was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelReason {
    /// Someone asked: a `cancel()` call or a failing sibling.
    Requested,
    /// The owning task's own deadline fired.
    DeadlineElapsed,
}

/// A nestable cancellation boundary.
///
/// Cancelling a scope cancels every scope derived from it through [`CancelScope::child`].
/// The first reason recorded on a scope sticks; a scope cancelled only through its parent
/// carries no reason of its own.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelScope {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancelScope {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::default(),
        }
    }

    /// Idempotent. Returns `true` only for the call that actually cancelled the scope.
    pub(crate) fn cancel(&self, reason: CancelReason) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        let _ = self.reason.set(reason);
        self.token.cancel();
        true
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
