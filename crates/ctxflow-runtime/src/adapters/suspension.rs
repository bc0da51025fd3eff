//! Suspend/resume points
//!
//! Models a generator or coroutine that yields at explicit points: the
//! yield is the branch point, the resume site contributes a dotted edge,
//! and the body after the yield runs under [`MergeKind::SuspensionResume`].

use crate::adapter::SchedulerAdapter;
use crate::engine::ContextEngine;
use crate::error::{EngineError, EngineResult};
use ctxflow_merge::OperationToken;
use ctxflow_model::{EdgeKind, MergeKind};
use parking_lot::Mutex;
use std::sync::Arc;

/// One suspendable computation
#[derive(Debug)]
pub struct Suspension {
    engine: Arc<ContextEngine>,
    pending: Mutex<Option<OperationToken>>,
}

impl Suspension {
    /// Create a running (not suspended) computation
    #[must_use]
    pub fn new(engine: Arc<ContextEngine>) -> Self {
        Self {
            engine,
            pending: Mutex::new(None),
        }
    }

    /// Check for a pending suspend
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Yield: capture the active snapshot
    ///
    /// Suspending again before resuming replaces the earlier capture.
    pub fn suspend(&self) -> OperationToken {
        let token = self.branch(None, EdgeKind::Solid);
        if let Some(previous) = self.pending.lock().replace(token.clone()) {
            tracing::debug!(token = %previous.id(), "suspension replaced before resume");
        }
        token
    }

    /// Resume: run `body` in the context merged from the yield point and
    /// the resume site
    ///
    /// # Errors
    /// - `NotSuspended` without a pending `suspend`
    /// - `Merge` if resolution fails; `body` does not run and the
    ///   suspension stays pending
    ///
    /// A `suspend` made by `body` itself stays pending for the next resume.
    pub fn resume<R>(&self, body: impl FnOnce() -> R) -> EngineResult<R> {
        let token = self.pending.lock().clone().ok_or(EngineError::NotSuspended)?;
        self.branch(Some(&token), EdgeKind::Dotted);
        let out = self.dispatch(&token, MergeKind::SuspensionResume, body)?;

        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|p| p.ptr_eq(&token)) {
            *pending = None;
        }
        Ok(out)
    }
}

impl SchedulerAdapter for Suspension {
    fn engine(&self) -> &ContextEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use ctxflow_merge::EdgeFilter;
    use ctxflow_model::{MergeStrategy, VariableRegistry};

    fn engine(config: EngineConfig) -> Arc<ContextEngine> {
        Arc::new(ContextEngine::bootstrap(Arc::new(VariableRegistry::new()), config).unwrap())
    }

    #[test]
    fn resume_without_suspend_fails() {
        let s = Suspension::new(engine(EngineConfig::default()));
        assert!(matches!(s.resume(|| ()), Err(EngineError::NotSuspended)));
    }

    #[test]
    fn resume_restores_yield_context() {
        let engine = engine(EngineConfig::default());
        let v = engine
            .declare_typed::<i64>("v", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        let s = Suspension::new(Arc::clone(&engine));

        engine.set(&v, 1);
        s.suspend();
        assert!(s.is_suspended());
        engine.set(&v, 2);

        let inside = s.resume(|| engine.get(&v)).unwrap();
        assert_eq!(inside, Some(1));
        assert_eq!(engine.get(&v), Some(2));
        assert!(!s.is_suspended());
    }

    #[test]
    fn dotted_only_resume_follows_resume_site() {
        let config = EngineConfig::new().with_edge_filter(MergeKind::SuspensionResume, EdgeFilter::DottedOnly);
        let engine = engine(config);
        let v = engine
            .declare_typed::<i64>("v", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        let s = Suspension::new(Arc::clone(&engine));

        engine.set(&v, 1);
        s.suspend();
        engine.set(&v, 2);
        assert_eq!(s.resume(|| engine.get(&v)).unwrap(), Some(2));
    }

    #[test]
    fn body_can_yield_again() {
        let engine = engine(EngineConfig::default());
        let v = engine
            .declare_typed::<i64>("v", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        let s = Suspension::new(Arc::clone(&engine));

        engine.set(&v, 1);
        s.suspend();
        let first = s
            .resume(|| {
                let seen = engine.get(&v);
                engine.set(&v, 3);
                s.suspend();
                seen
            })
            .unwrap();
        assert_eq!(first, Some(1));
        assert!(s.is_suspended());

        assert_eq!(s.resume(|| engine.get(&v)).unwrap(), Some(3));
        assert!(!s.is_suspended());
        assert_eq!(engine.get(&v), Some(1));
    }
}
