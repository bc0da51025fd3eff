//! Deferred resolutions and their reaction queue
//!
//! A [`Deferred`] is a promise-like value settled at most once. Branch
//! points:
//! - `then` records a solid edge for the reaction (its registration site)
//! - `settle` records a dotted edge on every pending reaction (the settle site)
//! - `settle_with` nests an inner deferred: its adoption runs as a chained
//!   operation, so the snapshot it settles in arrives at the outer reactions
//!   as a chained resolution. Adoptions of adoptions nest one level deeper in
//!   the outermost chain, whichever order they were set up in.
//!
//! Reactions run from [`ReactionQueue::drain`] under
//! [`MergeKind::ResolutionThenInvoke`]; adoptions under
//! [`MergeKind::ResolutionSettle`].

use crate::adapter::SchedulerAdapter;
use crate::engine::ContextEngine;
use crate::error::EngineResult;
use ctxflow_merge::OperationToken;
use ctxflow_model::{EdgeKind, MergeKind};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

type Job = Box<dyn FnOnce() + Send>;
type ReactionFn<T> = Box<dyn FnOnce(T) + Send>;

/// Token of a pending reaction; replaced when an adoption is rechained
type TokenSlot = Arc<Mutex<OperationToken>>;

struct QueuedJob {
    token: TokenSlot,
    kind: MergeKind,
    run: Job,
}

/// FIFO job queue shared by deferreds of one isolate
pub struct ReactionQueue {
    engine: Arc<ContextEngine>,
    jobs: Mutex<VecDeque<QueuedJob>>,
}

impl ReactionQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new(engine: Arc<ContextEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            jobs: Mutex::new(VecDeque::new()),
        })
    }

    /// Create a pending deferred whose reactions run on this queue
    #[must_use]
    pub fn deferred<T: Clone + Send + 'static>(self: &Arc<Self>) -> Deferred<T> {
        Deferred::new(Arc::clone(self))
    }

    /// Number of queued jobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Check for queued jobs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Run queued jobs until the queue is empty
    ///
    /// Jobs enqueued by running jobs run in the same drain. Returns the
    /// number of jobs run.
    ///
    /// # Errors
    /// Stops at the first job whose merge fails; that job is dropped.
    pub fn drain(&self) -> EngineResult<usize> {
        let mut ran = 0;
        loop {
            let job = self.jobs.lock().pop_front();
            let Some(job) = job else { break };
            let token = job.token.lock().clone();
            self.dispatch(&token, job.kind, job.run)?;
            ran += 1;
        }
        if ran > 0 {
            tracing::debug!(jobs = ran, "reaction queue drained");
        }
        Ok(ran)
    }

    fn enqueue(&self, token: TokenSlot, kind: MergeKind, run: Job) {
        self.jobs.lock().push_back(QueuedJob { token, kind, run });
    }
}

impl SchedulerAdapter for ReactionQueue {
    fn engine(&self) -> &ContextEngine {
        &self.engine
    }
}

impl fmt::Debug for ReactionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionQueue")
            .field("jobs", &self.len())
            .finish()
    }
}

struct Reaction<T> {
    token: TokenSlot,
    kind: MergeKind,
    callback: ReactionFn<T>,
}

struct Adoption<T> {
    inner: Deferred<T>,
    token: TokenSlot,
}

enum State<T> {
    Pending {
        reactions: Vec<Reaction<T>>,
        adoption: Option<Adoption<T>>,
        adopted_by: Option<TokenSlot>,
    },
    Settled(T),
}

struct DeferredInner<T> {
    queue: Arc<ReactionQueue>,
    token: OperationToken,
    state: Mutex<State<T>>,
}

/// Promise-like value settled at most once
pub struct Deferred<T> {
    inner: Arc<DeferredInner<T>>,
}

impl<T: Clone + Send + 'static> Deferred<T> {
    fn new(queue: Arc<ReactionQueue>) -> Self {
        let token = queue.branch(None, EdgeKind::Solid);
        Self {
            inner: Arc::new(DeferredInner {
                queue,
                token,
                state: Mutex::new(State::Pending {
                    reactions: Vec::new(),
                    adoption: None,
                    adopted_by: None,
                }),
            }),
        }
    }

    /// Token anchoring this deferred's reactions
    #[inline]
    #[must_use]
    pub fn token(&self) -> &OperationToken {
        &self.inner.token
    }

    /// Check whether a value has been settled
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Settled(_))
    }

    /// Settled value
    #[must_use]
    pub fn value(&self) -> Option<T> {
        match &*self.inner.state.lock() {
            State::Settled(value) => Some(value.clone()),
            State::Pending { .. } => None,
        }
    }

    /// Register a reaction; returns a deferred settled with its output
    ///
    /// The reaction runs in the context of this call site unless a chained
    /// resolution arrives first (see [`Deferred::settle_with`]).
    pub fn then<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let derived = Deferred::new(Arc::clone(&self.inner.queue));
        let target = derived.clone();
        let token = self.inner.queue.engine().chain(&self.inner.token);
        self.add_reaction(Reaction {
            token: Arc::new(Mutex::new(token)),
            kind: MergeKind::ResolutionThenInvoke,
            callback: Box::new(move |value| {
                target.settle_inner(f(value), true);
            }),
        });
        derived
    }

    /// Settle with a value; returns `false` if already settled or adopting
    pub fn settle(&self, value: T) -> bool {
        self.settle_inner(value, false)
    }

    /// Adopt `inner`'s eventual value
    ///
    /// Returns `false` if already settled or adopting, or if `inner` is
    /// (directly or through its own adoptions) waiting on this deferred.
    pub fn settle_with(&self, inner: &Deferred<T>) -> bool {
        if inner.awaits(self) {
            tracing::debug!(
                outer = %self.inner.token.id(),
                inner = %inner.token().id(),
                "adoption cycle rejected"
            );
            return false;
        }

        let token = {
            let mut state = self.inner.state.lock();
            let State::Pending {
                adoption,
                adopted_by,
                ..
            } = &mut *state
            else {
                return false;
            };
            if adoption.is_some() {
                return false;
            }
            let anchor = adopted_by
                .as_ref()
                .map_or_else(|| self.inner.token.clone(), |slot| slot.lock().clone());
            let token = Arc::new(Mutex::new(self.inner.queue.engine().chain(&anchor)));
            *adoption = Some(Adoption {
                inner: inner.clone(),
                token: Arc::clone(&token),
            });
            token
        };

        tracing::debug!(
            outer = %self.inner.token.id(),
            inner = %inner.token().id(),
            adoption = %token.lock().id(),
            "deferred adopting"
        );
        inner.adopted_under(&token);
        let outer = self.clone();
        inner.add_reaction(Reaction {
            token,
            kind: MergeKind::ResolutionSettle,
            callback: Box::new(move |value| {
                outer.settle_inner(value, true);
            }),
        });
        true
    }

    fn settle_inner(&self, value: T, adopted: bool) -> bool {
        let reactions = {
            let mut state = self.inner.state.lock();
            let reactions = match &mut *state {
                State::Settled(_) => return false,
                State::Pending {
                    adoption: Some(_), ..
                } if !adopted => return false,
                State::Pending { reactions, .. } => std::mem::take(reactions),
            };
            *state = State::Settled(value.clone());
            reactions
        };

        tracing::debug!(
            token = %self.inner.token.id(),
            reactions = reactions.len(),
            "deferred settled"
        );
        for reaction in reactions {
            self.schedule(reaction, value.clone());
        }
        true
    }

    /// Check whether this deferred is `other` or adopts it, transitively
    fn awaits(&self, other: &Deferred<T>) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(current) = cursor {
            if Arc::ptr_eq(&current.inner, &other.inner) {
                return true;
            }
            cursor = match &*current.inner.state.lock() {
                State::Pending {
                    adoption: Some(adoption),
                    ..
                } => Some(adoption.inner.clone()),
                _ => None,
            };
        }
        false
    }

    /// Record that this deferred's value is adopted by the operation in
    /// `slot`, moving its own pending adoption (if any) under that chain
    fn adopted_under(&self, slot: &TokenSlot) {
        let nested = {
            let mut state = self.inner.state.lock();
            let State::Pending {
                adoption,
                adopted_by,
                ..
            } = &mut *state
            else {
                return;
            };
            *adopted_by = Some(Arc::clone(slot));
            adoption
                .as_ref()
                .map(|a| (a.inner.clone(), Arc::clone(&a.token)))
        };

        let Some((inner, token)) = nested else { return };
        let anchor = slot.lock().clone();
        {
            let mut current = token.lock();
            let moved = self.inner.queue.engine().rechain(&current, &anchor);
            *current = moved;
        }
        inner.adopted_under(&token);
    }

    fn add_reaction(&self, reaction: Reaction<T>) {
        let settled = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending { reactions, .. } => {
                    reactions.push(reaction);
                    return;
                }
                State::Settled(value) => value.clone(),
            }
        };
        self.schedule(reaction, settled);
    }

    fn schedule(&self, reaction: Reaction<T>, value: T) {
        let queue = &self.inner.queue;
        let token = reaction.token.lock().clone();
        queue.branch(Some(&token), EdgeKind::Dotted);
        let callback = reaction.callback;
        queue.enqueue(reaction.token, reaction.kind, Box::new(move || callback(value)));
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settled = matches!(*self.inner.state.lock(), State::Settled(_));
        f.debug_struct("Deferred")
            .field("token", &self.inner.token.id())
            .field("settled", &settled)
            .finish()
    }
}
