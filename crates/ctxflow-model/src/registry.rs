//! Variable registry
//!
//! Provides [`VariableRegistry`], the append-only set of declared context
//! variables. Registration is structural: variables are never removed.

use crate::error::RegistryError;
use crate::ids::{RegistryId, VariableId};
use crate::strategy::MergeStrategy;
use crate::value::ContextValue;
use crate::variable::{ContextVar, ContextVariable, ValueType, VariableKey};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;

static GLOBAL: Lazy<Arc<VariableRegistry>> = Lazy::new(|| Arc::new(VariableRegistry::new()));

/// Append-only registry of context variables
///
/// Read-mostly and safe to share across threads. Iteration follows
/// declaration order, which is also the order the merge resolver visits
/// variables in.
#[derive(Debug)]
pub struct VariableRegistry {
    id: RegistryId,
    variables: RwLock<IndexMap<VariableKey, ContextVariable>>,
}

impl VariableRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: RegistryId::next(),
            variables: RwLock::new(IndexMap::new()),
        }
    }

    /// Process-wide registry
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Registry id
    #[inline]
    #[must_use]
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Declare an untyped variable
    ///
    /// # Errors
    /// Returns `DuplicateVariable` if `key` is already registered.
    pub fn declare(
        &self,
        key: impl Into<VariableKey>,
        default: Option<ContextValue>,
        strategy: MergeStrategy,
    ) -> Result<ContextVariable, RegistryError> {
        self.insert(key.into(), default, strategy, None)
    }

    /// Declare a typed variable
    ///
    /// # Errors
    /// Returns `DuplicateVariable` if `key` is already registered.
    pub fn declare_typed<T: Any + Send + Sync>(
        &self,
        key: impl Into<VariableKey>,
        default: Option<T>,
        strategy: MergeStrategy,
    ) -> Result<ContextVar<T>, RegistryError> {
        let variable = self.insert(
            key.into(),
            default.map(ContextValue::new),
            strategy,
            Some(ValueType::of::<T>()),
        )?;
        Ok(ContextVar::new(variable))
    }

    fn insert(
        &self,
        key: VariableKey,
        default: Option<ContextValue>,
        strategy: MergeStrategy,
        value_type: Option<ValueType>,
    ) -> Result<ContextVariable, RegistryError> {
        let mut variables = self.variables.write();
        if variables.contains_key(&key) {
            return Err(RegistryError::DuplicateVariable {
                key: key.to_string(),
            });
        }

        let index = u32::try_from(variables.len()).map_err(|_| RegistryError::CapacityExceeded)?;
        let variable = ContextVariable::new(
            VariableId::new(self.id, index),
            key.clone(),
            default,
            strategy,
            value_type,
        );
        variables.insert(key, variable.clone());
        drop(variables);

        tracing::debug!(
            key = %variable.key(),
            id = %variable.id(),
            strategy = variable.strategy().name(),
            "declared context variable"
        );
        Ok(variable)
    }

    /// Look up a variable by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ContextVariable> {
        self.variables.read().get(key).cloned()
    }

    /// Look up a typed handle by key
    ///
    /// # Errors
    /// Returns `UnknownVariable` if `key` is not registered, or
    /// `TypeMismatch` if it was declared with a different type (or untyped).
    pub fn lookup<T: Any + Send + Sync>(&self, key: &str) -> Result<ContextVar<T>, RegistryError> {
        let variable = self.get(key).ok_or_else(|| RegistryError::UnknownVariable {
            key: key.to_string(),
        })?;
        let wanted = ValueType::of::<T>();
        match variable.value_type() {
            Some(declared) if declared == wanted => Ok(ContextVar::new(variable)),
            declared => Err(RegistryError::TypeMismatch {
                key: key.to_string(),
                expected: wanted.name,
                actual: declared.map_or("<untyped>", |t| t.name),
            }),
        }
    }

    /// Check if a key is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.variables.read().contains_key(key)
    }

    /// All variables in declaration order
    #[must_use]
    pub fn variables(&self) -> Vec<ContextVariable> {
        self.variables.read().values().cloned().collect()
    }

    /// Number of declared variables
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.read().len()
    }

    /// Check if nothing is declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.read().is_empty()
    }
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_new_empty() {
        let registry = VariableRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn declare_and_get() {
        let registry = VariableRegistry::new();
        let v = registry
            .declare("trace.id", Some(ContextValue::new(0_u64)), MergeStrategy::ExecutionFlow)
            .unwrap();
        let found = registry.get("trace.id").unwrap();
        assert_eq!(found, v);
        assert!(registry.contains("trace.id"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicate_declaration_fails() {
        let registry = VariableRegistry::new();
        registry
            .declare("principal", None, MergeStrategy::SourceGraph)
            .unwrap();
        let err = registry
            .declare("principal", None, MergeStrategy::ExecutionFlow)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateVariable { ref key } if key == "principal"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ids_follow_declaration_order() {
        let registry = VariableRegistry::new();
        let a = registry.declare("a", None, MergeStrategy::ExecutionFlow).unwrap();
        let b = registry.declare("b", None, MergeStrategy::ExecutionFlow).unwrap();
        assert_eq!(a.id().index(), 0);
        assert_eq!(b.id().index(), 1);
        let keys: Vec<_> = registry.variables().iter().map(|v| v.key().to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn lookup_checks_type() {
        let registry = VariableRegistry::new();
        registry
            .declare_typed::<String>("locale", None, MergeStrategy::SourceGraph)
            .unwrap();
        registry.declare("raw", None, MergeStrategy::ExecutionFlow).unwrap();

        assert!(registry.lookup::<String>("locale").is_ok());
        assert!(matches!(
            registry.lookup::<u32>("locale"),
            Err(RegistryError::TypeMismatch { .. })
        ));
        assert!(matches!(
            registry.lookup::<u32>("raw"),
            Err(RegistryError::TypeMismatch { actual: "<untyped>", .. })
        ));
        assert!(matches!(
            registry.lookup::<u32>("nope"),
            Err(RegistryError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn registries_are_independent() {
        let a = VariableRegistry::new();
        let b = VariableRegistry::new();
        let va = a.declare("same", None, MergeStrategy::ExecutionFlow).unwrap();
        let vb = b.declare("same", None, MergeStrategy::ExecutionFlow).unwrap();
        assert_ne!(va.id(), vb.id());
    }

    #[test]
    fn global_registry_is_shared() {
        let a = VariableRegistry::global();
        let b = VariableRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
