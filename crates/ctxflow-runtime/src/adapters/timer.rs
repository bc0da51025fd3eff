//! Virtual-time timer queue
//!
//! `schedule` is the branch point (solid edge at the call site); timers
//! fire under [`MergeKind::TimerFire`] when virtual time is advanced past
//! their deadline.

use crate::adapter::SchedulerAdapter;
use crate::engine::ContextEngine;
use crate::error::EngineResult;
use ctxflow_merge::OperationToken;
use ctxflow_model::{EdgeKind, MergeKind};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type TimerCallback = Box<dyn FnOnce() + Send>;

/// Handle of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

struct Timer {
    token: OperationToken,
    callback: TimerCallback,
}

#[derive(Default)]
struct TimerState {
    now: u64,
    next_id: u64,
    // keyed by (deadline, id): equal deadlines fire in scheduling order
    pending: BTreeMap<(u64, TimerId), Timer>,
}

/// Timer queue driven by explicit [`TimerQueue::advance`] calls
///
/// Callbacks may schedule further timers on the same queue.
pub struct TimerQueue {
    engine: Arc<ContextEngine>,
    state: Mutex<TimerState>,
}

impl TimerQueue {
    /// Create an empty queue at time 0
    #[must_use]
    pub fn new(engine: Arc<ContextEngine>) -> Self {
        Self {
            engine,
            state: Mutex::new(TimerState::default()),
        }
    }

    /// Current virtual time
    #[must_use]
    pub fn now(&self) -> u64 {
        self.state.lock().now
    }

    /// Number of timers not yet fired
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Schedule `callback` to fire `delay` ticks from now
    pub fn schedule(&self, delay: u64, callback: impl FnOnce() + Send + 'static) -> TimerId {
        let token = self.branch(None, EdgeKind::Solid);
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let deadline = state.now.saturating_add(delay);
        state.pending.insert(
            (deadline, id),
            Timer {
                token,
                callback: Box::new(callback),
            },
        );
        tracing::debug!(timer = id.0, deadline, "timer scheduled");
        id
    }

    /// Cancel a pending timer; returns `false` if it already fired
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut state = self.state.lock();
        let key = state.pending.keys().find(|(_, t)| *t == id).copied();
        let removed = key.and_then(|k| state.pending.remove(&k));
        drop(state);

        match removed {
            Some(timer) => {
                self.engine.cancel(&timer.token);
                true
            }
            None => false,
        }
    }

    /// Advance virtual time, firing every timer that falls due
    ///
    /// Returns the number of callbacks run.
    ///
    /// # Errors
    /// Stops at the first timer whose merge fails; that timer is dropped
    /// and later ones stay queued.
    pub fn advance(&self, ticks: u64) -> EngineResult<usize> {
        let target = {
            let state = self.state.lock();
            state.now.saturating_add(ticks)
        };

        let mut fired = 0;
        while let Some((deadline, timer)) = self.pop_due(target) {
            self.state.lock().now = deadline;
            self.dispatch(&timer.token, MergeKind::TimerFire, timer.callback)?;
            fired += 1;
        }
        self.state.lock().now = target;
        Ok(fired)
    }

    fn pop_due(&self, target: u64) -> Option<(u64, Timer)> {
        let mut state = self.state.lock();
        let entry = state.pending.first_entry()?;
        if entry.key().0 > target {
            return None;
        }
        let (deadline, _) = *entry.key();
        Some((deadline, entry.remove()))
    }
}

impl SchedulerAdapter for TimerQueue {
    fn engine(&self) -> &ContextEngine {
        &self.engine
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TimerQueue")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use ctxflow_model::{MergeStrategy, VariableRegistry};

    fn engine() -> Arc<ContextEngine> {
        Arc::new(
            ContextEngine::bootstrap(Arc::new(VariableRegistry::new()), EngineConfig::default())
                .unwrap(),
        )
    }

    #[test]
    fn fires_in_deadline_order() {
        let queue = TimerQueue::new(engine());
        let order = Arc::new(Mutex::new(Vec::new()));
        for (delay, label) in [(30, "c"), (10, "a"), (20, "b"), (10, "a2")] {
            let order = Arc::clone(&order);
            queue.schedule(delay, move || order.lock().push(label));
        }

        assert_eq!(queue.advance(15).unwrap(), 2);
        assert_eq!(queue.now(), 15);
        assert_eq!(queue.advance(100).unwrap(), 2);
        assert_eq!(*order.lock(), vec!["a", "a2", "b", "c"]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn callback_sees_scheduling_context() {
        let engine = engine();
        let v = engine
            .declare_typed::<i64>("v", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        let queue = TimerQueue::new(Arc::clone(&engine));
        let seen = Arc::new(Mutex::new(None));

        engine.set(&v, 1);
        {
            let (engine, v, seen) = (Arc::clone(&engine), v.clone(), Arc::clone(&seen));
            queue.schedule(5, move || *seen.lock() = engine.get(&v));
        }
        engine.set(&v, 2);
        queue.advance(5).unwrap();

        assert_eq!(*seen.lock(), Some(1));
        assert_eq!(engine.get(&v), Some(2));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let queue = TimerQueue::new(engine());
        let fired = Arc::new(Mutex::new(false));
        let id = {
            let fired = Arc::clone(&fired);
            queue.schedule(1, move || *fired.lock() = true)
        };
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert_eq!(queue.advance(10).unwrap(), 0);
        assert!(!*fired.lock());
    }
}
