//! Error types for the runtime
//!
//! Provides error handling for:
//! - Engine construction (realm bootstrap, configuration)
//! - Variable declaration and typed access
//! - Merge resolution at adapter dispatch
//! - Adapter misuse and callback failures

use crate::config::ConfigError;
use ctxflow_merge::MergeError;
use ctxflow_model::{RealmError, RegistryError};

/// Main runtime error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Declaration or typed access failed
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Merge resolution failed; the callback did not run
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    /// Realm bootstrap failed
    #[error("realm error: {0}")]
    Realm(#[from] RealmError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `resume` called without a pending `suspend`
    #[error("resume called on a suspension that is not suspended")]
    NotSuspended,

    /// Adapter callback reported a failure
    #[error("callback failed: {0}")]
    Callback(String),
}

impl EngineError {
    /// Check if the error came out of merge resolution
    #[inline]
    #[must_use]
    pub fn is_merge(&self) -> bool {
        matches!(self, Self::Merge(_))
    }
}

/// Result type for runtime operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_errors_are_flagged() {
        let err: EngineError = MergeError::MissingInitialSnapshot.into();
        assert!(err.is_merge());
        assert!(!EngineError::NotSuspended.is_merge());
    }

    #[test]
    fn display_wraps_source() {
        let err: EngineError = RealmError::AlreadyBootstrapped.into();
        assert_eq!(err.to_string(), "realm error: realm already bootstrapped");
    }
}
