//! Merge edges and merge points
//!
//! A [`MergeEdge`] links a captured [`Snapshot`] to an operation token. The
//! [`MergeKind`] tags the site where those edges are later merged.

use crate::ids::TokenId;
use crate::snapshot::Snapshot;
use std::fmt::{self, Display, Formatter};

/// Kind of incoming edge at a merge point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Causally-immediate predecessor: where the interaction was issued
    Solid,

    /// Candidate predecessor that may or may not win
    Dotted,
}

impl EdgeKind {
    /// Check for a solid edge
    #[inline]
    #[must_use]
    pub fn is_solid(self) -> bool {
        matches!(self, Self::Solid)
    }
}

/// Site where a merge resolution runs
///
/// The kind only decides which edges are eligible; it never changes the
/// semantics of the built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeKind {
    /// A timer callback is about to fire
    TimerFire,

    /// A deferred resolution adopts another resolution's outcome
    ResolutionSettle,

    /// A reaction registered on a deferred resolution is about to run
    ResolutionThenInvoke,

    /// An event listener is about to be invoked
    ListenerInvoke,

    /// A suspended computation is about to resume
    SuspensionResume,

    /// Host-defined merge point
    Other(&'static str),
}

impl MergeKind {
    /// Stable name, used as configuration key
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TimerFire => "timer-fire",
            Self::ResolutionSettle => "resolution-settle",
            Self::ResolutionThenInvoke => "resolution-then-invoke",
            Self::ListenerInvoke => "listener-invoke",
            Self::SuspensionResume => "suspension-resume",
            Self::Other(name) => name,
        }
    }
}

impl Display for MergeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Provenance of a snapshot produced by (or derived from) a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolutionMark {
    /// Token whose resolution produced the snapshot
    pub token: TokenId,

    /// Root of that token's chain
    pub root: TokenId,

    /// Nesting depth of that token within its chain
    pub depth: u32,
}

impl ResolutionMark {
    /// Check whether this mark counts as a chained resolution for a token
    ///
    /// True when the mark belongs to the same chain as `token` but was
    /// produced by a different token of that chain.
    #[inline]
    #[must_use]
    pub fn chains_into(&self, token: TokenId, root: TokenId) -> bool {
        self.root == root && self.token != token
    }
}

/// One incoming edge recorded against an operation token
#[derive(Debug, Clone)]
pub struct MergeEdge {
    snapshot: Snapshot,
    kind: EdgeKind,
    seq: u64,
    synthesized: bool,
}

impl MergeEdge {
    /// Create a recorded edge
    ///
    /// `seq` is the recording order within the owning token and starts at 1.
    #[inline]
    #[must_use]
    pub fn new(snapshot: Snapshot, kind: EdgeKind, seq: u64) -> Self {
        Self {
            snapshot,
            kind,
            seq,
            synthesized: false,
        }
    }

    /// Fallback dotted edge carrying the realm's initial snapshot
    ///
    /// Ordered before every recorded edge.
    #[inline]
    #[must_use]
    pub fn initial(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            kind: EdgeKind::Dotted,
            seq: 0,
            synthesized: true,
        }
    }

    /// Captured snapshot
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Edge kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    /// Recording order within the token
    #[inline]
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// True for the synthesized initial-snapshot edge
    #[inline]
    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    /// Chain depth if this edge carries a chained resolution for `token`
    ///
    /// Only dotted edges can be chained; a solid edge is always the plain
    /// registration point.
    #[must_use]
    pub fn chained_depth(&self, token: TokenId, root: TokenId) -> Option<u32> {
        if self.kind.is_solid() {
            return None;
        }
        self.snapshot
            .mark()
            .filter(|m| m.chains_into(token, root))
            .map(|m| m.depth)
    }
}
