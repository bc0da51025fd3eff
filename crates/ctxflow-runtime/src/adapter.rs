//! Scheduler adapter interface
//!
//! The narrow contract an external scheduler implements: call
//! [`SchedulerAdapter::branch`] at every interaction point it considers
//! branch-worthy, and run every previously scheduled callback through
//! [`SchedulerAdapter::dispatch`].

use crate::engine::ContextEngine;
use crate::error::EngineResult;
use ctxflow_merge::OperationToken;
use ctxflow_model::{EdgeKind, MergeKind};

/// Hooks a scheduler calls around its own bookkeeping
pub trait SchedulerAdapter {
    /// Engine of the isolate the scheduler runs in
    fn engine(&self) -> &ContextEngine;

    /// Capture the active snapshot at a branch point
    fn branch(&self, existing: Option<&OperationToken>, kind: EdgeKind) -> OperationToken {
        self.engine().record_branch(existing, kind)
    }

    /// Resolve `token` and run `callback` inside the merged snapshot
    ///
    /// # Errors
    /// Returns `Merge` if resolution fails; `callback` does not run.
    fn dispatch<R>(
        &self,
        token: &OperationToken,
        kind: MergeKind,
        callback: impl FnOnce() -> R,
    ) -> EngineResult<R>
    where
        Self: Sized,
    {
        self.engine().dispatch(token, kind, callback)
    }
}
