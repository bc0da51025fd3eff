//! Event listener set
//!
//! Registration is the branch point. Every `emit` re-arms each listener's
//! token with a fork, records the emit site as a dotted edge on the fork and
//! invokes the listener under [`MergeKind::ListenerInvoke`].

use crate::adapter::SchedulerAdapter;
use crate::engine::ContextEngine;
use crate::error::EngineResult;
use ctxflow_merge::OperationToken;
use ctxflow_model::{EdgeKind, MergeKind};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type ListenerFn<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener<E> {
    id: ListenerId,
    token: OperationToken,
    callback: ListenerFn<E>,
}

impl<E> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            token: self.token.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Listeners for events of type `E`, invoked in registration order
pub struct ListenerSet<E> {
    engine: Arc<ContextEngine>,
    listeners: Mutex<Vec<Listener<E>>>,
    next_id: AtomicU64,
}

impl<E> ListenerSet<E> {
    /// Create an empty set
    #[must_use]
    pub fn new(engine: Arc<ContextEngine>) -> Self {
        Self {
            engine,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener in the current context
    pub fn on(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let token = self.branch(None, EdgeKind::Solid);
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(listener = id.0, token = %token.id(), "listener registered");
        self.listeners.lock().push(Listener {
            id,
            token,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn off(&self, id: ListenerId) -> bool {
        let removed = {
            let mut listeners = self.listeners.lock();
            let index = listeners.iter().position(|l| l.id == id);
            index.map(|i| listeners.remove(i))
        };
        match removed {
            Some(listener) => {
                self.engine.cancel(&listener.token);
                true
            }
            None => false,
        }
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Check for registered listeners
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Invoke every listener registered when the emit starts
    ///
    /// Returns the number of listeners invoked.
    ///
    /// # Errors
    /// Stops at the first listener whose merge fails.
    pub fn emit(&self, event: &E) -> EngineResult<usize> {
        let listeners: Vec<Listener<E>> = self.listeners.lock().clone();
        for listener in &listeners {
            let invocation = self.engine.fork(&listener.token);
            self.branch(Some(&invocation), EdgeKind::Dotted);
            self.dispatch(&invocation, MergeKind::ListenerInvoke, || {
                (listener.callback)(event);
            })?;
        }
        Ok(listeners.len())
    }
}

impl<E> SchedulerAdapter for ListenerSet<E> {
    fn engine(&self) -> &ContextEngine {
        &self.engine
    }
}

impl<E> fmt::Debug for ListenerSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use ctxflow_merge::EdgeFilter;
    use ctxflow_model::{ContextValue, MergeStrategy, VariableRegistry};

    fn engine(config: EngineConfig) -> Arc<ContextEngine> {
        Arc::new(ContextEngine::bootstrap(Arc::new(VariableRegistry::new()), config).unwrap())
    }

    #[test]
    fn listener_runs_in_registration_context_each_time() {
        let engine = engine(EngineConfig::default());
        let v = engine
            .declare_typed::<i64>("v", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        let set = ListenerSet::<u8>::new(Arc::clone(&engine));
        let seen = Arc::new(Mutex::new(Vec::new()));

        engine.set(&v, 1);
        {
            let (engine, v, seen) = (Arc::clone(&engine), v.clone(), Arc::clone(&seen));
            set.on(move |event| seen.lock().push((*event, engine.get(&v))));
        }

        engine.set(&v, 2);
        assert_eq!(set.emit(&10).unwrap(), 1);
        engine.set(&v, 3);
        assert_eq!(set.emit(&20).unwrap(), 1);

        assert_eq!(*seen.lock(), vec![(10, Some(1)), (20, Some(1))]);
    }

    #[test]
    fn custom_strategy_sees_emit_site() {
        let engine = engine(EngineConfig::default());
        let latest = engine
            .declare_typed::<i64>(
                "latest",
                None,
                MergeStrategy::custom(|input| {
                    Ok(input
                        .latest()
                        .and_then(|edge| input.value_on(edge))
                        .cloned())
                }),
            )
            .unwrap();
        let set = ListenerSet::<()>::new(Arc::clone(&engine));
        let seen = Arc::new(Mutex::new(Vec::new()));

        engine.set(&latest, 1);
        {
            let (engine, latest, seen) = (Arc::clone(&engine), latest.clone(), Arc::clone(&seen));
            set.on(move |()| seen.lock().push(engine.get(&latest)));
        }
        engine.set(&latest, 2);
        set.emit(&()).unwrap();
        engine.set(&latest, 3);
        set.emit(&()).unwrap();

        assert_eq!(*seen.lock(), vec![Some(2), Some(3)]);
    }

    #[test]
    fn solid_only_override_hides_emit_site() {
        let config = EngineConfig::new().with_edge_filter(MergeKind::ListenerInvoke, EdgeFilter::SolidOnly);
        let engine = engine(config);
        let count = engine
            .declare(
                "edges",
                None,
                MergeStrategy::custom(|input| Ok(Some(ContextValue::new(input.edges().len())))),
            )
            .unwrap();
        let set = ListenerSet::<()>::new(Arc::clone(&engine));
        let seen = Arc::new(Mutex::new(None));
        {
            let (engine, count, seen) = (Arc::clone(&engine), count.clone(), Arc::clone(&seen));
            set.on(move |()| {
                *seen.lock() = count
                    .read(&engine.current())
                    .and_then(|v| v.downcast_ref::<usize>())
                    .copied();
            });
        }
        set.emit(&()).unwrap();
        assert_eq!(*seen.lock(), Some(1));
    }

    #[test]
    fn off_removes_listener() {
        let engine = engine(EngineConfig::default());
        let set = ListenerSet::<()>::new(engine);
        let id = set.on(|()| {});
        assert_eq!(set.len(), 1);
        assert!(set.off(id));
        assert!(!set.off(id));
        assert_eq!(set.emit(&()).unwrap(), 0);
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let set = Arc::new(ListenerSet::<()>::new(engine(EngineConfig::default())));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || (0..8).map(|_| set.on(|()| {})).collect::<Vec<_>>())
            })
            .collect();
        let mut ids: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .map(|ListenerId(n)| n)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 32);
        assert_eq!(set.len(), 32);
    }
}
