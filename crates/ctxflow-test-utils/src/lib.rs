//! Testing utilities for the ctxflow workspace
//!
//! Shared fixtures: fresh engines, variable declarations, strategies and a
//! sink for values observed inside callbacks.

#![allow(missing_docs)]

use ctxflow_model::{ContextValue, ContextVar, MergeStrategy, VariableRegistry};
use ctxflow_runtime::{ContextEngine, EngineConfig};
use parking_lot::Mutex;
use std::sync::Arc;

/// Fresh engine over its own registry, default configuration
pub fn engine() -> Arc<ContextEngine> {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> Arc<ContextEngine> {
    let engine = ContextEngine::bootstrap(Arc::new(VariableRegistry::new()), config)
        .expect("engine bootstrap");
    Arc::new(engine)
}

pub fn declare_i64(engine: &ContextEngine, key: &str, strategy: MergeStrategy) -> ContextVar<i64> {
    engine
        .declare_typed::<i64>(key, None, strategy)
        .expect("fresh registry accepts declaration")
}

/// Custom strategy picking the most recently recorded edge's value
pub fn last_write_wins() -> MergeStrategy {
    MergeStrategy::custom(|input| {
        Ok(input
            .latest()
            .and_then(|edge| input.value_on(edge))
            .cloned())
    })
}

/// Custom strategy counting the eligible edges it was offered
pub fn edge_count() -> MergeStrategy {
    MergeStrategy::custom(|input| Ok(Some(ContextValue::new(input.edges().len()))))
}

/// Values recorded from inside callbacks, in order
#[derive(Debug)]
pub struct Observations<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T> Observations<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, value: T) {
        self.seen.lock().push(value);
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

impl<T: Clone> Observations<T> {
    pub fn values(&self) -> Vec<T> {
        self.seen.lock().clone()
    }
}

impl<T> Clone for Observations<T> {
    fn clone(&self) -> Self {
        Self {
            seen: Arc::clone(&self.seen),
        }
    }
}

impl<T> Default for Observations<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback recording the current value of `variable` on each call
pub fn observe<T>(
    engine: &Arc<ContextEngine>,
    variable: &ContextVar<T>,
    sink: &Observations<Option<T>>,
) -> impl Fn() + Send + Sync + 'static
where
    T: Clone + Send + Sync + 'static,
{
    let (engine, variable, sink) = (Arc::clone(engine), variable.clone(), sink.clone());
    move || sink.record(engine.get(&variable))
}
