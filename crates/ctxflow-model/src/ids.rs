//! Identifier newtypes
//!
//! Snapshot and token identifiers come from process-wide monotonic counters,
//! so they are unique for the lifetime of the process and totally ordered by
//! creation time.

use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_REGISTRY_ID: AtomicU32 = AtomicU32::new(1);

/// Unique snapshot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(u64);

impl SnapshotId {
    /// Allocate the next snapshot id
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for SnapshotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "snap#{}", self.0)
    }
}

/// Unique operation-token identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(u64);

impl TokenId {
    /// Allocate the next token id
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for TokenId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "tok#{}", self.0)
    }
}

/// Identifier of a variable registry
///
/// Variable ids are dense per registry; the registry id keeps ids from two
/// registries from being confused with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistryId(u32);

impl RegistryId {
    /// Allocate the next registry id
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for RegistryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "reg#{}", self.0)
    }
}

/// Identifier of a declared context variable
///
/// Assigned densely in declaration order within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId {
    registry: RegistryId,
    index: u32,
}

impl VariableId {
    #[inline]
    pub(crate) const fn new(registry: RegistryId, index: u32) -> Self {
        Self { registry, index }
    }

    /// Declaration index within the owning registry
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Owning registry
    #[inline]
    #[must_use]
    pub const fn registry(self) -> RegistryId {
        self.registry
    }
}

impl Display for VariableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "var#{}.{}", self.registry.0, self.index)
    }
}
