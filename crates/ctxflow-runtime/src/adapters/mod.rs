//! In-process scheduler adapters
//!
//! Deterministic schedulers wired to the engine the way a host runtime's
//! own schedulers would be. Each one decides which of its interaction
//! points are branch points and which merge kind its callbacks run under.

mod deferred;
mod future;
mod listener;
mod suspension;
mod timer;

pub use deferred::{Deferred, ReactionQueue};
pub use future::{ContextFuture, InContextExt};
pub use listener::{ListenerId, ListenerSet};
pub use suspension::Suspension;
pub use timer::{TimerId, TimerQueue};
