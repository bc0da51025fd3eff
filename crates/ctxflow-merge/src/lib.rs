//! ctxflow Merge Resolution
//!
//! Records where scheduled operations branch off the active context and,
//! when they later run, merges the recorded snapshots back into one.
//!
//! # Core Concepts
//!
//! - [`OperationToken`]: Opaque handle owning one operation's recorded edges
//! - [`BranchRecorder`]: Captures the active snapshot at branch points
//! - [`MergeResolver`]: Picks a winner per variable and builds the merged snapshot
//! - [`EligibilityPolicy`]: Which edge kinds take part at each merge point
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ctxflow_merge::{BranchRecorder, MergeResolver};
//! use ctxflow_model::{EdgeKind, MergeKind, MergeStrategy, Realm, VariableRegistry};
//!
//! let realm = Realm::bootstrapped(Arc::new(VariableRegistry::new()));
//! let request = realm
//!     .registry()
//!     .declare_typed::<u64>("request", None, MergeStrategy::ExecutionFlow)
//!     .unwrap();
//!
//! let recorder = BranchRecorder::new();
//! let resolver = MergeResolver::new(Arc::clone(&realm));
//!
//! // Schedule a callback while request = 7
//! let at_schedule = request.derive(&realm.initial_snapshot().unwrap(), 7_u64);
//! let token = recorder.record_branch(&at_schedule, None, EdgeKind::Solid);
//!
//! // Callback fires later
//! let merged = resolver.resolve(&token, MergeKind::TimerFire).unwrap();
//! assert_eq!(request.get_cloned(&merged), Some(7));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod eligibility;
mod error;
mod recorder;
mod resolver;
mod token;

// Re-exports
pub use eligibility::{EdgeFilter, EligibilityPolicy};
pub use error::{MergeError, MergeResult};
pub use recorder::{ActiveContext, BranchRecorder, DEFAULT_HISTORY_LIMIT};
pub use resolver::MergeResolver;
pub use token::{Appended, OperationToken};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
