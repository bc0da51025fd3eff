//! Branch recorder
//!
//! Provides [`BranchRecorder`], called by scheduler adapters at every
//! interaction point they consider branch-worthy (callback registration,
//! resolve/reject, listener registration, suspension).

use crate::token::{Appended, OperationToken};
use ctxflow_model::{EdgeKind, Snapshot};

/// Default number of late edges kept per token
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// Source of the currently active snapshot
///
/// Implemented by the active-context stack; a bare [`Snapshot`] also works
/// and always reports itself.
pub trait ActiveContext {
    /// Snapshot active right now
    fn current(&self) -> Snapshot;
}

impl ActiveContext for Snapshot {
    fn current(&self) -> Snapshot {
        self.clone()
    }
}

/// Captures snapshots into operation tokens
#[derive(Debug, Clone)]
pub struct BranchRecorder {
    history_limit: usize,
}

impl BranchRecorder {
    /// Create recorder with the default history limit
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Set late-edge history limit per token (0 disables history)
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Late-edge history limit
    #[inline]
    #[must_use]
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Record a branch point
    ///
    /// Without `existing`, creates a new token whose solid edge is the
    /// current snapshot (`kind` is ignored: a new branch point always has
    /// exactly one solid edge). With `existing`, appends an edge of `kind`
    /// carrying the current snapshot and returns the same token.
    pub fn record_branch(
        &self,
        ctx: &dyn ActiveContext,
        existing: Option<&OperationToken>,
        kind: EdgeKind,
    ) -> OperationToken {
        match existing {
            Some(token) => {
                self.append(token, ctx.current(), kind);
                token.clone()
            }
            None => {
                let token = OperationToken::root();
                self.append(&token, ctx.current(), EdgeKind::Solid);
                tracing::debug!(token = %token.id(), "opened branch");
                token
            }
        }
    }

    /// Create a token with no edges (pure queue dispatch)
    ///
    /// Until edges are contributed, resolution falls back to the realm's
    /// initial snapshot.
    #[must_use]
    pub fn open(&self) -> OperationToken {
        let token = OperationToken::root();
        tracing::debug!(token = %token.id(), "opened edgeless token");
        token
    }

    /// Create a token nested inside `outer`'s chain
    ///
    /// Snapshots produced by resolving the new token count as chained
    /// resolutions when they later arrive on another token of the same chain.
    pub fn chain(&self, ctx: &dyn ActiveContext, outer: &OperationToken) -> OperationToken {
        let token = OperationToken::chained(outer);
        self.append(&token, ctx.current(), EdgeKind::Solid);
        tracing::debug!(
            token = %token.id(),
            root = %token.root_id(),
            depth = token.depth(),
            "chained branch"
        );
        token
    }

    /// Re-arm a recurring operation
    ///
    /// The fork starts with a copy of `source`'s recorded edges, so a
    /// listener registered once can be resolved afresh for every invocation.
    #[must_use]
    pub fn fork(&self, source: &OperationToken) -> OperationToken {
        let token = OperationToken::forked(source);
        tracing::trace!(token = %token.id(), source = %source.id(), "forked token");
        token
    }

    /// Move a not-yet-resolved chained operation under `outer`
    ///
    /// Used when the operation that `source` was chained to turns out to be
    /// nested inside `outer`'s chain itself. The new token carries a copy of
    /// `source`'s edges; `source` should no longer be used.
    #[must_use]
    pub fn rechain(&self, source: &OperationToken, outer: &OperationToken) -> OperationToken {
        let token = OperationToken::rechained(source, outer);
        tracing::debug!(
            token = %token.id(),
            source = %source.id(),
            root = %token.root_id(),
            depth = token.depth(),
            "rechained branch"
        );
        token
    }

    /// Mark a token cancelled
    pub fn cancel(&self, token: &OperationToken) {
        token.cancel();
        tracing::debug!(token = %token.id(), "token cancelled");
    }

    fn append(&self, token: &OperationToken, snapshot: Snapshot, kind: EdgeKind) {
        let snapshot_id = snapshot.id();
        match token.append(snapshot, kind, self.history_limit) {
            Appended::Recorded { seq } => {
                tracing::trace!(token = %token.id(), snapshot = %snapshot_id, ?kind, seq, "recorded edge");
            }
            Appended::Archived { seq } => {
                tracing::warn!(
                    token = %token.id(),
                    snapshot = %snapshot_id,
                    ?kind,
                    seq,
                    "edge recorded after final merge; kept in history only"
                );
            }
        }
    }
}

impl Default for BranchRecorder {
    fn default() -> Self {
        Self::new()
    }
}
