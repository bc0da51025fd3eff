//! Merge resolution errors

use ctxflow_model::{RealmError, RegistryError, StrategyError};

/// Errors raised while resolving an operation token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Fallback to the initial snapshot needed but the realm was never
    /// bootstrapped
    #[error("no eligible solid edge and no initial snapshot to fall back to")]
    MissingInitialSnapshot,

    /// A custom strategy failed
    #[error("merge strategy for '{key}' failed: {source}")]
    Strategy {
        /// Variable whose strategy failed
        key: String,
        /// Failure reported by the strategy
        #[source]
        source: StrategyError,
    },

    /// A custom strategy produced an unusable value
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Realm in an unexpected state
    #[error(transparent)]
    Realm(RealmError),
}

impl From<RealmError> for MergeError {
    fn from(err: RealmError) -> Self {
        match err {
            RealmError::MissingInitialSnapshot => Self::MissingInitialSnapshot,
            RealmError::AlreadyBootstrapped => Self::Realm(err),
        }
    }
}

/// Result type for merge operations
pub type MergeResult<T> = Result<T, MergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_error_names_variable() {
        let err = MergeError::Strategy {
            key: "deadline".to_string(),
            source: StrategyError::new("expired"),
        };
        assert_eq!(err.to_string(), "merge strategy for 'deadline' failed: expired");
    }

    #[test]
    fn realm_error_maps_to_missing_initial() {
        let err: MergeError = RealmError::MissingInitialSnapshot.into();
        assert_eq!(err, MergeError::MissingInitialSnapshot);
    }

    #[test]
    fn double_bootstrap_keeps_realm_error() {
        let err: MergeError = RealmError::AlreadyBootstrapped.into();
        assert_eq!(err, MergeError::Realm(RealmError::AlreadyBootstrapped));
        assert_eq!(err.to_string(), "realm already bootstrapped");
    }
}
