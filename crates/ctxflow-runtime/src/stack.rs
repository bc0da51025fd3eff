//! Active-context stack
//!
//! One isolate's stack of activated snapshots. The root frame holds the
//! realm's initial snapshot and can never be popped, so [`ContextStack::current`]
//! always has an answer.

use ctxflow_merge::ActiveContext;
use ctxflow_model::{ContextValue, ContextVar, ContextVariable, RegistryError, Snapshot};
use parking_lot::Mutex;
use std::any::Any;
use std::thread::{self, ThreadId};

/// Stack of activated snapshots
///
/// The internal lock is held only for frame bookkeeping, never while a
/// body runs.
///
/// While frames are pushed the stack belongs to the thread that pushed
/// them. Handing the stack to another thread between scopes is fine;
/// entering it from a second thread while the first is still inside a
/// scope is a bug, caught by a debug assertion.
#[derive(Debug)]
pub struct ContextStack {
    frames: Mutex<Frames>,
}

#[derive(Debug)]
struct Frames {
    root: Snapshot,
    pushed: Vec<Snapshot>,
    owner: Option<ThreadId>,
}

impl Frames {
    fn top_mut(&mut self) -> &mut Snapshot {
        match self.pushed.last_mut() {
            Some(top) => top,
            None => &mut self.root,
        }
    }
}

/// Restores the stack to its depth before [`ContextStack::enter`] on drop
#[must_use = "the snapshot is deactivated as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    stack: &'a ContextStack,
    depth: usize,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        let mut frames = self.stack.frames.lock();
        if frames.pushed.len() > self.depth {
            frames.pushed.truncate(self.depth);
        }
        if frames.pushed.is_empty() {
            frames.owner = None;
        }
    }
}

impl ContextStack {
    /// Create a stack whose root frame is `root`
    #[must_use]
    pub fn new(root: Snapshot) -> Self {
        Self {
            frames: Mutex::new(Frames {
                root,
                pushed: Vec::new(),
                owner: None,
            }),
        }
    }

    /// Active snapshot
    #[must_use]
    pub fn current(&self) -> Snapshot {
        let frames = self.frames.lock();
        frames.pushed.last().unwrap_or(&frames.root).clone()
    }

    /// Number of frames above the root
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.lock().pushed.len()
    }

    /// Activate `snapshot` until the returned guard drops
    pub fn enter(&self, snapshot: Snapshot) -> ScopeGuard<'_> {
        let mut frames = self.frames.lock();
        let caller = thread::current().id();
        debug_assert!(
            frames.owner.is_none() || frames.owner == Some(caller),
            "context stack entered from a second thread while another thread's scope is active"
        );
        frames.owner = Some(caller);
        let depth = frames.pushed.len();
        frames.pushed.push(snapshot);
        ScopeGuard { stack: self, depth }
    }

    /// Run `body` with `snapshot` active
    ///
    /// The prior snapshot is restored however `body` exits, unwinding
    /// included.
    pub fn with_snapshot<R>(&self, snapshot: Snapshot, body: impl FnOnce() -> R) -> R {
        let _guard = self.enter(snapshot);
        body()
    }

    /// Run a fallible `body` with `snapshot` active
    ///
    /// # Errors
    /// Returns whatever `body` returns; the prior snapshot is restored first.
    pub fn try_with_snapshot<T, E>(
        &self,
        snapshot: Snapshot,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let _guard = self.enter(snapshot);
        body()
    }

    /// Assign a value in the current frame
    ///
    /// Replaces the top frame with a derived snapshot; no frame is pushed.
    ///
    /// # Errors
    /// Returns `TypeMismatch` if `variable` is typed and `value` is not.
    pub fn set_variable(
        &self,
        variable: &ContextVariable,
        value: ContextValue,
    ) -> Result<(), RegistryError> {
        variable.check(&value)?;
        let mut frames = self.frames.lock();
        let top = frames.top_mut();
        *top = top.with_value(variable.id(), value);
        Ok(())
    }

    /// Typed assignment in the current frame
    pub fn set<T: Any + Send + Sync>(&self, variable: &ContextVar<T>, value: T) {
        let mut frames = self.frames.lock();
        let top = frames.top_mut();
        *top = variable.derive(top, value);
    }

    /// Clear a variable in the current frame (reads fall back to its default)
    pub fn unset(&self, variable: &ContextVariable) {
        let mut frames = self.frames.lock();
        let top = frames.top_mut();
        *top = top.without_value(variable.id());
    }

    /// Typed read of the current value
    #[must_use]
    pub fn get<T: Any + Send + Sync + Clone>(&self, variable: &ContextVar<T>) -> Option<T> {
        variable.get_cloned(&self.current())
    }
}

impl ActiveContext for ContextStack {
    fn current(&self) -> Snapshot {
        ContextStack::current(self)
    }
}
