//! Error types for the data model
//!
//! Provides error handling for:
//! - Variable registration (duplicate keys, type mismatches)
//! - Realm bootstrap

/// Errors raised by the variable registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Key already registered
    #[error("context variable already declared: '{key}'")]
    DuplicateVariable {
        /// Colliding key
        key: String,
    },

    /// Key not registered
    #[error("unknown context variable: '{key}'")]
    UnknownVariable {
        /// Missing key
        key: String,
    },

    /// Value or handle type differs from the declaration
    #[error("type mismatch for '{key}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Variable key
        key: String,
        /// Declared (or requested) type
        expected: &'static str,
        /// Offending type
        actual: &'static str,
    },

    /// Too many variables for the id space
    #[error("variable registry capacity exceeded")]
    CapacityExceeded,
}

/// Errors raised by realm bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RealmError {
    /// `bootstrap` called twice
    #[error("realm already bootstrapped")]
    AlreadyBootstrapped,

    /// Initial snapshot requested before bootstrap
    #[error("realm has no initial snapshot (bootstrap skipped)")]
    MissingInitialSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_display() {
        let err = RegistryError::DuplicateVariable {
            key: "trace.id".to_string(),
        };
        assert_eq!(err.to_string(), "context variable already declared: 'trace.id'");
    }

    #[test]
    fn type_mismatch_display() {
        let err = RegistryError::TypeMismatch {
            key: "depth".to_string(),
            expected: "u32",
            actual: "&str",
        };
        assert!(err.to_string().contains("expected u32, got &str"));
    }

    #[test]
    fn realm_error_display() {
        assert!(RealmError::MissingInitialSnapshot
            .to_string()
            .contains("bootstrap skipped"));
    }
}
