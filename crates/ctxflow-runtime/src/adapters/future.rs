//! Futures that carry their context across polls
//!
//! [`ContextFuture`] captures the active snapshot when it is created. Each
//! poll is a resume: the poller's context is recorded as a dotted edge, the
//! captured context is resolved under [`MergeKind::SuspensionResume`] and
//! the inner future is polled inside it. Whatever the inner future assigns
//! before returning `Pending` is captured again for the next poll.

use crate::adapter::SchedulerAdapter;
use crate::engine::ContextEngine;
use crate::error::EngineResult;
use ctxflow_merge::OperationToken;
use ctxflow_model::{EdgeKind, MergeKind};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Future polled inside its captured context
///
/// The engine's stack belongs to one isolate. Context futures of one engine
/// may migrate between threads, but must not be polled concurrently; on a
/// multi-thread runtime give each task tree its own engine.
pub struct ContextFuture<F> {
    engine: Arc<ContextEngine>,
    token: OperationToken,
    inner: Pin<Box<F>>,
}

impl<F: Future> ContextFuture<F> {
    /// Wrap `inner`, capturing the active snapshot
    pub fn new(engine: Arc<ContextEngine>, inner: F) -> Self {
        let token = engine.record_branch(None, EdgeKind::Solid);
        Self {
            engine,
            token,
            inner: Box::pin(inner),
        }
    }

    /// Token holding the current capture
    #[inline]
    #[must_use]
    pub fn token(&self) -> &OperationToken {
        &self.token
    }
}

impl<F: Future> Future for ContextFuture<F> {
    type Output = EngineResult<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.branch(Some(&this.token), EdgeKind::Dotted);
        let snapshot = match this.engine.resolve(&this.token, MergeKind::SuspensionResume) {
            Ok(snapshot) => snapshot,
            Err(e) => return Poll::Ready(Err(e)),
        };

        let guard = this.engine.enter(snapshot);
        let poll = this.inner.as_mut().poll(cx);
        if poll.is_pending() {
            this.token = this.branch(None, EdgeKind::Solid);
        }
        drop(guard);

        poll.map(Ok)
    }
}

impl<F> SchedulerAdapter for ContextFuture<F> {
    fn engine(&self) -> &ContextEngine {
        &self.engine
    }
}

impl<F> fmt::Debug for ContextFuture<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFuture")
            .field("token", &self.token.id())
            .finish_non_exhaustive()
    }
}

/// Attach a context to any future
pub trait InContextExt: Future + Sized {
    /// Poll `self` inside the snapshot active right now
    fn in_context(self, engine: &Arc<ContextEngine>) -> ContextFuture<Self> {
        ContextFuture::new(Arc::clone(engine), self)
    }
}

impl<F: Future> InContextExt for F {}
