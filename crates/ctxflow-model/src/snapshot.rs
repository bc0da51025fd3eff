//! Immutable context snapshots
//!
//! A [`Snapshot`] records the value of every context variable at one
//! instant. Snapshots are persistent maps: deriving a new snapshot shares all
//! unchanged entries with its parent, and no snapshot is ever mutated after
//! construction.

use crate::edge::ResolutionMark;
use crate::ids::{SnapshotId, TokenId, VariableId};
use crate::value::ContextValue;
use std::fmt;
use std::sync::Arc;

/// How a snapshot came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Realm bootstrap (the initial snapshot, no parent)
    Bootstrap,

    /// Scoped mutation of a parent snapshot
    Derived {
        /// Snapshot the mutation was applied to
        parent: SnapshotId,
    },

    /// Output of a merge resolution
    Merged {
        /// Token whose resolution produced this snapshot
        token: TokenId,
    },
}

/// Immutable record of context-variable values
///
/// Cheap to clone (reference-counted). Variables without an entry read as
/// their declared default.
#[derive(Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

struct SnapshotInner {
    id: SnapshotId,
    origin: SnapshotOrigin,
    mark: Option<ResolutionMark>,
    values: im::HashMap<VariableId, ContextValue>,
}

impl Snapshot {
    /// Create an initial snapshot with no explicit values
    ///
    /// Only realm bootstrap should call this; everything else derives from an
    /// existing snapshot.
    #[must_use]
    pub fn bootstrap() -> Self {
        Self::from_parts(SnapshotOrigin::Bootstrap, None, im::HashMap::new())
    }

    fn from_parts(
        origin: SnapshotOrigin,
        mark: Option<ResolutionMark>,
        values: im::HashMap<VariableId, ContextValue>,
    ) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                id: SnapshotId::next(),
                origin,
                mark,
                values,
            }),
        }
    }

    /// Derive a snapshot with one value replaced
    ///
    /// The derived snapshot inherits this snapshot's resolution mark.
    #[must_use]
    pub fn with_value(&self, variable: VariableId, value: ContextValue) -> Self {
        let mut values = self.inner.values.clone();
        values.insert(variable, value);
        Self::from_parts(
            SnapshotOrigin::Derived { parent: self.id() },
            self.inner.mark,
            values,
        )
    }

    /// Derive a snapshot with one value removed (reads fall back to default)
    #[must_use]
    pub fn without_value(&self, variable: VariableId) -> Self {
        let mut values = self.inner.values.clone();
        values.remove(&variable);
        Self::from_parts(
            SnapshotOrigin::Derived { parent: self.id() },
            self.inner.mark,
            values,
        )
    }

    /// Assemble a merged snapshot
    ///
    /// Starts from `base` and applies each winner: `Some` installs the value,
    /// `None` clears the entry. Entries whose winner is already present in
    /// `base` (same allocation) are left shared.
    #[must_use]
    pub fn merged<I>(base: &Snapshot, winners: I, mark: ResolutionMark) -> Self
    where
        I: IntoIterator<Item = (VariableId, Option<ContextValue>)>,
    {
        let mut values = base.inner.values.clone();
        for (variable, winner) in winners {
            match winner {
                Some(value) => {
                    let shared = values.get(&variable).is_some_and(|v| v.ptr_eq(&value));
                    if !shared {
                        values.insert(variable, value);
                    }
                }
                None => {
                    values.remove(&variable);
                }
            }
        }
        Self::from_parts(SnapshotOrigin::Merged { token: mark.token }, Some(mark), values)
    }

    /// Snapshot identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> SnapshotId {
        self.inner.id
    }

    /// Provenance of this snapshot
    #[inline]
    #[must_use]
    pub fn origin(&self) -> SnapshotOrigin {
        self.inner.origin
    }

    /// Resolution this snapshot descends from, if any
    #[inline]
    #[must_use]
    pub fn mark(&self) -> Option<ResolutionMark> {
        self.inner.mark
    }

    /// Explicit value for a variable (no default fallback)
    #[inline]
    #[must_use]
    pub fn value(&self, variable: VariableId) -> Option<&ContextValue> {
        self.inner.values.get(&variable)
    }

    /// Check for an explicit value
    #[inline]
    #[must_use]
    pub fn contains(&self, variable: VariableId) -> bool {
        self.inner.values.contains_key(&variable)
    }

    /// Number of explicit values
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    /// Check if no variable has an explicit value
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty()
    }

    /// Iterate over explicit values (unordered)
    pub fn iter(&self) -> impl Iterator<Item = (&VariableId, &ContextValue)> {
        self.inner.values.iter()
    }

    /// Identity comparison
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Check that both snapshots hold the same value allocations for every
    /// variable
    #[must_use]
    pub fn same_values(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(id, v)| other.value(*id).is_some_and(|w| w.ptr_eq(v)))
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.inner.id)
            .field("origin", &self.inner.origin)
            .field("mark", &self.inner.mark)
            .field("values", &self.inner.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RegistryId;

    fn var(index: u32) -> VariableId {
        VariableId::new(RegistryId::next(), index)
    }

    fn mark() -> ResolutionMark {
        let token = TokenId::next();
        ResolutionMark { token, root: token, depth: 0 }
    }

    #[test]
    fn bootstrap_is_empty() {
        let s = Snapshot::bootstrap();
        assert!(s.is_empty());
        assert_eq!(s.origin(), SnapshotOrigin::Bootstrap);
        assert!(s.mark().is_none());
    }

    #[test]
    fn with_value_leaves_parent_untouched() {
        let v = var(0);
        let parent = Snapshot::bootstrap();
        let child = parent.with_value(v, ContextValue::new(1_i64));

        assert!(parent.value(v).is_none());
        assert_eq!(child.value(v).and_then(|x| x.downcast_ref::<i64>()), Some(&1));
        assert_eq!(child.origin(), SnapshotOrigin::Derived { parent: parent.id() });
    }

    #[test]
    fn derived_snapshot_inherits_mark() {
        let v = var(0);
        let m = mark();
        let merged = Snapshot::merged(&Snapshot::bootstrap(), Vec::new(), m);
        let derived = merged.with_value(v, ContextValue::new(3_i64));
        assert_eq!(derived.mark(), Some(m));
    }

    #[test]
    fn merged_shares_unchanged_values() {
        let a = var(0);
        let b = var(1);
        let base = Snapshot::bootstrap()
            .with_value(a, ContextValue::new(1_i64))
            .with_value(b, ContextValue::new(2_i64));
        let keep = base.value(a).cloned();
        let merged = Snapshot::merged(&base, vec![(a, keep), (b, None)], mark());

        assert!(merged.value(a).zip(base.value(a)).is_some_and(|(x, y)| x.ptr_eq(y)));
        assert!(!merged.contains(b));
        assert!(base.contains(b));
    }

    #[test]
    fn same_values_compares_allocations() {
        let a = var(0);
        let base = Snapshot::bootstrap().with_value(a, ContextValue::new(1_i64));
        let copy = Snapshot::merged(&base, vec![(a, base.value(a).cloned())], mark());
        assert!(base.same_values(&copy));
        assert!(!base.ptr_eq(&copy));

        let other = base.with_value(a, ContextValue::new(1_i64));
        assert!(!base.same_values(&other));
    }

    proptest::proptest! {
        #[test]
        fn derived_chain_matches_plain_assignment(
            writes in proptest::collection::vec((0_u32..4, proptest::num::i64::ANY), 0..32)
        ) {
            let registry = RegistryId::next();
            let mut expected = std::collections::HashMap::new();
            let mut snapshot = Snapshot::bootstrap();
            let root = snapshot.clone();

            for (index, value) in writes {
                snapshot = snapshot.with_value(VariableId::new(registry, index), ContextValue::new(value));
                expected.insert(index, value);
            }

            proptest::prop_assert_eq!(snapshot.len(), expected.len());
            for (index, value) in expected {
                let got = snapshot
                    .value(VariableId::new(registry, index))
                    .and_then(|v| v.downcast_ref::<i64>());
                proptest::prop_assert_eq!(got, Some(&value));
            }
            proptest::prop_assert!(root.is_empty());
        }
    }
}
