//! Per-variable merge strategies
//!
//! Each context variable carries one [`MergeStrategy`]; the merge resolver
//! dispatches on it directly when it picks the variable's winning value.

use crate::edge::{EdgeKind, MergeEdge, MergeKind};
use crate::ids::TokenId;
use crate::value::ContextValue;
use crate::variable::ContextVariable;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Signature of a user-supplied merge function
///
/// Must be pure: it sees the edges read-only and returns the winning value,
/// or `None` to leave the variable unset (reads fall back to the default).
pub type CustomMergeFn =
    dyn Fn(&MergeInput<'_>) -> Result<Option<ContextValue>, StrategyError> + Send + Sync;

/// Resolution policy of one context variable
#[derive(Clone, Default)]
pub enum MergeStrategy {
    /// Follow the dynamic causal chain
    ///
    /// Deepest chained resolution wins, then the solid edge, then the most
    /// recently recorded dotted edge.
    #[default]
    ExecutionFlow,

    /// Follow the registration chain: always the solid edge's value
    SourceGraph,

    /// User-supplied pure function over the ordered edge list
    Custom(Arc<CustomMergeFn>),
}

impl MergeStrategy {
    /// Wrap a custom merge function
    #[must_use]
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&MergeInput<'_>) -> Result<Option<ContextValue>, StrategyError>
            + Send
            + Sync
            + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Strategy name (for logging)
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecutionFlow => "execution-flow",
            Self::SourceGraph => "source-graph",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only view handed to a custom merge function
#[derive(Debug)]
pub struct MergeInput<'a> {
    variable: &'a ContextVariable,
    edges: &'a [MergeEdge],
    kind: MergeKind,
    token: TokenId,
    cancelled: bool,
}

impl<'a> MergeInput<'a> {
    /// Create an input view
    #[inline]
    #[must_use]
    pub fn new(
        variable: &'a ContextVariable,
        edges: &'a [MergeEdge],
        kind: MergeKind,
        token: TokenId,
        cancelled: bool,
    ) -> Self {
        Self {
            variable,
            edges,
            kind,
            token,
            cancelled,
        }
    }

    /// Variable being resolved
    #[inline]
    #[must_use]
    pub fn variable(&self) -> &'a ContextVariable {
        self.variable
    }

    /// Eligible edges in recording order
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &'a [MergeEdge] {
        self.edges
    }

    /// Merge point being resolved
    #[inline]
    #[must_use]
    pub fn merge_kind(&self) -> MergeKind {
        self.kind
    }

    /// Token being resolved
    #[inline]
    #[must_use]
    pub fn token(&self) -> TokenId {
        self.token
    }

    /// Whether the adapter cancelled the token
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Explicit value on one edge (no default fallback)
    #[must_use]
    pub fn value_on(&self, edge: &'a MergeEdge) -> Option<&'a ContextValue> {
        edge.snapshot().value(self.variable.id())
    }

    /// Edge kind and explicit value of every edge, in order
    pub fn values(&self) -> impl Iterator<Item = (EdgeKind, Option<&'a ContextValue>)> + '_ {
        self.edges.iter().map(|e| (e.kind(), self.value_on(e)))
    }

    /// Edge kind and typed value of every edge, in order
    ///
    /// Values of another type read as `None`.
    pub fn values_as<T: Any>(&self) -> impl Iterator<Item = (EdgeKind, Option<&'a T>)> + '_ {
        self.values()
            .map(|(kind, v)| (kind, v.and_then(ContextValue::downcast_ref::<T>)))
    }

    /// First recorded solid edge
    #[must_use]
    pub fn solid(&self) -> Option<&'a MergeEdge> {
        self.edges.iter().find(|e| e.kind().is_solid())
    }

    /// Most recently recorded edge of any kind
    #[must_use]
    pub fn latest(&self) -> Option<&'a MergeEdge> {
        self.edges.iter().max_by_key(|e| e.seq())
    }
}

/// Failure raised by a custom merge function
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StrategyError {
    message: String,
}

impl StrategyError {
    /// Create strategy error
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error message
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
