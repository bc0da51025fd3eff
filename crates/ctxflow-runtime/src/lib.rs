//! ctxflow Runtime
//!
//! Per-isolate machinery for context propagation across asynchronous
//! scheduling boundaries.
//!
//! # Core Concepts
//!
//! - [`ContextStack`]: Scoped activation of snapshots with guaranteed restoration
//! - [`ContextEngine`]: Facade over stack, branch recorder and merge resolver
//! - [`SchedulerAdapter`]: Contract a scheduler implements around its callbacks
//! - [`adapters`]: Timer, deferred, listener, suspension and future adapters
//! - [`EngineConfig`]: History limit, edge eligibility and logging settings
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ctxflow_model::{MergeStrategy, VariableRegistry};
//! use ctxflow_runtime::{adapters::TimerQueue, ContextEngine, EngineConfig};
//!
//! let engine = Arc::new(
//!     ContextEngine::bootstrap(Arc::new(VariableRegistry::new()), EngineConfig::default()).unwrap(),
//! );
//! let user = engine
//!     .declare_typed::<String>("user", None, MergeStrategy::ExecutionFlow)
//!     .unwrap();
//!
//! let timers = TimerQueue::new(Arc::clone(&engine));
//! engine.set(&user, "alice".to_string());
//! {
//!     let (engine, user) = (Arc::clone(&engine), user.clone());
//!     timers.schedule(10, move || {
//!         assert_eq!(engine.get(&user).as_deref(), Some("alice"));
//!     });
//! }
//! engine.set(&user, "bob".to_string());
//! timers.advance(10).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod adapter;
pub mod adapters;
mod config;
mod engine;
mod error;
pub mod logging;
mod stack;

// Re-exports
pub use adapter::SchedulerAdapter;
pub use config::{ConfigError, EngineConfig, LoggingConfig, MAX_HISTORY_LIMIT};
pub use engine::ContextEngine;
pub use error::{EngineError, EngineResult};
pub use stack::{ContextStack, ScopeGuard};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
