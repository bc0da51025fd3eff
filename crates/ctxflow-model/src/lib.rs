//! ctxflow Data Model
//!
//! Immutable snapshots of dynamically-scoped context variables, and the
//! edges that connect them across scheduling boundaries.
//!
//! # Core Concepts
//!
//! - [`Snapshot`]: Immutable, structurally-shared record of variable values
//! - [`ContextVariable`] / [`ContextVar<T>`]: Declared variables and typed handles
//! - [`VariableRegistry`]: Append-only, process-wide set of declarations
//! - [`MergeStrategy`]: Per-variable resolution policy
//! - [`MergeEdge`] / [`MergeKind`]: Captured edges and the sites that merge them
//! - [`Realm`]: Registry plus the one initial snapshot
//!
//! # Example
//!
//! ```rust
//! use ctxflow_model::{MergeStrategy, Snapshot, VariableRegistry};
//!
//! let registry = VariableRegistry::new();
//! let locale = registry
//!     .declare_typed("locale", Some(String::from("en")), MergeStrategy::SourceGraph)
//!     .unwrap();
//!
//! let initial = Snapshot::bootstrap();
//! let french = locale.derive(&initial, String::from("fr"));
//!
//! assert_eq!(locale.get(&initial).map(String::as_str), Some("en"));
//! assert_eq!(locale.get(&french).map(String::as_str), Some("fr"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod edge;
mod error;
mod ids;
mod realm;
mod registry;
mod snapshot;
mod strategy;
mod value;
mod variable;

// Re-exports
pub use edge::{EdgeKind, MergeEdge, MergeKind, ResolutionMark};
pub use error::{RealmError, RegistryError};
pub use ids::{RegistryId, SnapshotId, TokenId, VariableId};
pub use realm::Realm;
pub use registry::VariableRegistry;
pub use snapshot::{Snapshot, SnapshotOrigin};
pub use strategy::{CustomMergeFn, MergeInput, MergeStrategy, StrategyError};
pub use value::ContextValue;
pub use variable::{ContextVar, ContextVariable, VariableKey};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
