//! Realm bootstrap
//!
//! A [`Realm`] pairs a variable registry with the one initial snapshot that
//! every isolate of the realm starts from and that merge resolution falls
//! back to when a token has no solid edge.

use crate::error::RealmError;
use crate::registry::VariableRegistry;
use crate::snapshot::Snapshot;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Registry plus once-only initial snapshot
#[derive(Debug)]
pub struct Realm {
    registry: Arc<VariableRegistry>,
    initial: OnceCell<Snapshot>,
}

impl Realm {
    /// Create a realm over `registry` (not yet bootstrapped)
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<VariableRegistry>) -> Self {
        Self {
            registry,
            initial: OnceCell::new(),
        }
    }

    /// Create and bootstrap a realm in one step
    #[must_use]
    pub fn bootstrapped(registry: Arc<VariableRegistry>) -> Arc<Self> {
        let realm = Self::new(registry);
        let _ = realm.initial.set(Snapshot::bootstrap());
        Arc::new(realm)
    }

    /// Variable registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<VariableRegistry> {
        &self.registry
    }

    /// Create the initial snapshot
    ///
    /// # Errors
    /// Returns `AlreadyBootstrapped` on every call after the first.
    pub fn bootstrap(&self) -> Result<Snapshot, RealmError> {
        let snapshot = Snapshot::bootstrap();
        self.initial
            .set(snapshot.clone())
            .map_err(|_| RealmError::AlreadyBootstrapped)?;
        tracing::debug!(snapshot = %snapshot.id(), "realm bootstrapped");
        Ok(snapshot)
    }

    /// Initial snapshot
    ///
    /// # Errors
    /// Returns `MissingInitialSnapshot` before `bootstrap`.
    pub fn initial_snapshot(&self) -> Result<Snapshot, RealmError> {
        self.initial
            .get()
            .cloned()
            .ok_or(RealmError::MissingInitialSnapshot)
    }

    /// Check bootstrap state
    #[inline]
    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        self.initial.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotOrigin;

    #[test]
    fn bootstrap_once() {
        let realm = Realm::new(Arc::new(VariableRegistry::new()));
        assert!(!realm.is_bootstrapped());
        assert_eq!(
            realm.initial_snapshot().unwrap_err(),
            RealmError::MissingInitialSnapshot
        );

        let initial = realm.bootstrap().unwrap();
        assert_eq!(initial.origin(), SnapshotOrigin::Bootstrap);
        assert!(realm.initial_snapshot().unwrap().ptr_eq(&initial));
        assert_eq!(realm.bootstrap().unwrap_err(), RealmError::AlreadyBootstrapped);
    }

    #[test]
    fn bootstrapped_constructor() {
        let realm = Realm::bootstrapped(Arc::new(VariableRegistry::new()));
        assert!(realm.is_bootstrapped());
    }
}
