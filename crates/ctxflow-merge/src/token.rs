//! Operation tokens
//!
//! An [`OperationToken`] is the opaque handle a scheduler adapter keeps for
//! one scheduled operation. It owns the append-only list of edges recorded
//! at the operation's branch points.

use ctxflow_model::{EdgeKind, MergeEdge, ResolutionMark, Snapshot, TokenId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Opaque handle for one scheduled operation
///
/// Cheap to clone; clones refer to the same operation. Edge appends are
/// serialized by an internal mutex, so a token may be shared across threads.
#[derive(Clone)]
pub struct OperationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    id: TokenId,
    lineage: TokenId,
    root: TokenId,
    depth: u32,
    cancelled: AtomicBool,
    state: Mutex<TokenState>,
}

#[derive(Default)]
struct TokenState {
    edges: Vec<MergeEdge>,
    history: VecDeque<MergeEdge>,
    next_seq: u64,
    finalized: bool,
    resolutions: u64,
}

/// Where an appended edge ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// Edge is eligible for resolution
    Recorded {
        /// Recording order within the token
        seq: u64,
    },

    /// Token already finalized: edge kept for diagnostics only
    Archived {
        /// Recording order within the token
        seq: u64,
    },
}

impl OperationToken {
    fn build(id: TokenId, lineage: TokenId, root: TokenId, depth: u32, state: TokenState) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id,
                lineage,
                root,
                depth,
                cancelled: AtomicBool::new(false),
                state: Mutex::new(state),
            }),
        }
    }

    /// New token rooting its own chain, with no edges
    pub(crate) fn root() -> Self {
        let id = TokenId::next();
        Self::build(id, id, id, 0, TokenState::default())
    }

    /// New token nested one level below `outer` in `outer`'s chain
    pub(crate) fn chained(outer: &OperationToken) -> Self {
        let id = TokenId::next();
        Self::build(
            id,
            id,
            outer.root_id(),
            outer.depth().saturating_add(1),
            TokenState::default(),
        )
    }

    /// Re-armed copy of `source` sharing its recorded edges and lineage
    pub(crate) fn forked(source: &OperationToken) -> Self {
        Self::build(
            TokenId::next(),
            source.inner.lineage,
            source.root_id(),
            source.depth(),
            source.unresolved_copy(),
        )
    }

    /// Copy of `source`'s recorded edges, nested one level below `outer`
    pub(crate) fn rechained(source: &OperationToken, outer: &OperationToken) -> Self {
        let id = TokenId::next();
        let token = Self::build(
            id,
            id,
            outer.root_id(),
            outer.depth().saturating_add(1),
            source.unresolved_copy(),
        );
        if source.is_cancelled() {
            token.cancel();
        }
        token
    }

    fn unresolved_copy(&self) -> TokenState {
        let state = self.inner.state.lock();
        TokenState {
            edges: state.edges.clone(),
            history: VecDeque::new(),
            next_seq: state.next_seq,
            finalized: false,
            resolutions: 0,
        }
    }

    /// Append an edge
    ///
    /// Once the token is finalized, edges go to the bounded history log and
    /// take no part in resolution.
    pub(crate) fn append(&self, snapshot: Snapshot, kind: EdgeKind, history_limit: usize) -> Appended {
        let mut state = self.inner.state.lock();
        state.next_seq += 1;
        let seq = state.next_seq;
        let edge = MergeEdge::new(snapshot, kind, seq);

        if !state.finalized {
            state.edges.push(edge);
            return Appended::Recorded { seq };
        }

        if history_limit > 0 {
            if state.history.len() == history_limit {
                state.history.pop_front();
            }
            state.history.push_back(edge);
        }
        Appended::Archived { seq }
    }

    /// Mark the final merge as executed; returns the number of resolutions so far
    pub(crate) fn finalize(&self) -> u64 {
        let mut state = self.inner.state.lock();
        state.finalized = true;
        state.resolutions += 1;
        state.resolutions
    }

    /// Token id
    #[inline]
    #[must_use]
    pub fn id(&self) -> TokenId {
        self.inner.id
    }

    /// Id of the operation this token arms (differs from `id` for forks)
    #[inline]
    #[must_use]
    pub fn lineage(&self) -> TokenId {
        self.inner.lineage
    }

    /// Root of this token's chain
    #[inline]
    #[must_use]
    pub fn root_id(&self) -> TokenId {
        self.inner.root
    }

    /// Nesting depth within the chain (0 for a root)
    #[inline]
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    /// Check if this token was chained to an outer operation
    #[inline]
    #[must_use]
    pub fn is_chained(&self) -> bool {
        self.inner.depth > 0
    }

    /// Mark carried by snapshots this token's resolution produces
    #[inline]
    #[must_use]
    pub fn resolution_mark(&self) -> ResolutionMark {
        ResolutionMark {
            token: self.inner.lineage,
            root: self.inner.root,
            depth: self.inner.depth,
        }
    }

    /// Mark the operation cancelled
    ///
    /// Resolution still produces a snapshot; custom strategies can observe
    /// the flag.
    #[inline]
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Check cancellation
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Check if the final merge already executed
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.inner.state.lock().finalized
    }

    /// Number of completed resolutions
    #[must_use]
    pub fn resolutions(&self) -> u64 {
        self.inner.state.lock().resolutions
    }

    /// Recorded edges in recording order
    #[must_use]
    pub fn edges(&self) -> Vec<MergeEdge> {
        self.inner.state.lock().edges.clone()
    }

    /// Number of recorded edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.state.lock().edges.len()
    }

    /// Edges recorded after finalization (oldest first, bounded)
    #[must_use]
    pub fn history(&self) -> Vec<MergeEdge> {
        self.inner.state.lock().history.iter().cloned().collect()
    }

    /// Identity comparison
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("OperationToken")
            .field("id", &self.inner.id)
            .field("root", &self.inner.root)
            .field("depth", &self.inner.depth)
            .field("edges", &state.edges.len())
            .field("finalized", &state.finalized)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
