//! Context variable declarations
//!
//! Provides [`ContextVariable`], the immutable declaration of one variable,
//! and [`ContextVar<T>`], a typed handle over it.

use crate::error::RegistryError;
use crate::ids::VariableId;
use crate::snapshot::Snapshot;
use crate::strategy::MergeStrategy;
use crate::value::ContextValue;
use std::any::{Any, TypeId};
use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

/// Unique name of a context variable
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableKey(Arc<str>);

impl VariableKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Key as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VariableKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariableKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VariableKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl Borrow<str> for VariableKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Declared value type of a typed variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ValueType {
    pub(crate) id: TypeId,
    pub(crate) name: &'static str,
}

impl ValueType {
    pub(crate) fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// Immutable declaration of a context variable
///
/// Cheap to clone. Two handles are the same variable iff their ids match.
#[derive(Clone)]
pub struct ContextVariable {
    inner: Arc<VariableDecl>,
}

struct VariableDecl {
    id: VariableId,
    key: VariableKey,
    default: Option<ContextValue>,
    strategy: MergeStrategy,
    value_type: Option<ValueType>,
}

impl ContextVariable {
    pub(crate) fn new(
        id: VariableId,
        key: VariableKey,
        default: Option<ContextValue>,
        strategy: MergeStrategy,
        value_type: Option<ValueType>,
    ) -> Self {
        Self {
            inner: Arc::new(VariableDecl {
                id,
                key,
                default,
                strategy,
                value_type,
            }),
        }
    }

    /// Variable id
    #[inline]
    #[must_use]
    pub fn id(&self) -> VariableId {
        self.inner.id
    }

    /// Variable key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &VariableKey {
        &self.inner.key
    }

    /// Declared default value
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> Option<&ContextValue> {
        self.inner.default.as_ref()
    }

    /// Merge strategy
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> &MergeStrategy {
        &self.inner.strategy
    }

    /// Declared value type name, for typed variables
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> Option<&'static str> {
        self.inner.value_type.map(|t| t.name)
    }

    pub(crate) fn value_type(&self) -> Option<ValueType> {
        self.inner.value_type
    }

    /// Value visible in `snapshot`, falling back to the default
    #[must_use]
    pub fn read<'a>(&'a self, snapshot: &'a Snapshot) -> Option<&'a ContextValue> {
        snapshot.value(self.id()).or(self.inner.default.as_ref())
    }

    /// Check that `value` may be stored in this variable
    ///
    /// # Errors
    /// Returns `TypeMismatch` when the variable is typed and the value's type
    /// differs.
    pub fn check(&self, value: &ContextValue) -> Result<(), RegistryError> {
        match self.inner.value_type {
            Some(expected) if expected.id != value.value_type_id() => {
                Err(RegistryError::TypeMismatch {
                    key: self.key().to_string(),
                    expected: expected.name,
                    actual: value.type_name(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl PartialEq for ContextVariable {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ContextVariable {}

impl fmt::Debug for ContextVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextVariable")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("strategy", &self.inner.strategy)
            .field("type", &self.type_name())
            .finish()
    }
}

/// Typed handle to a declared context variable
pub struct ContextVar<T> {
    variable: ContextVariable,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ContextVar<T> {
    pub(crate) fn new(variable: ContextVariable) -> Self {
        Self {
            variable,
            _marker: PhantomData,
        }
    }

    /// Untyped declaration
    #[inline]
    #[must_use]
    pub fn variable(&self) -> &ContextVariable {
        &self.variable
    }

    /// Variable id
    #[inline]
    #[must_use]
    pub fn id(&self) -> VariableId {
        self.variable.id()
    }

    /// Variable key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &VariableKey {
        self.variable.key()
    }

    /// Typed value visible in `snapshot`, falling back to the default
    #[must_use]
    pub fn get<'a>(&'a self, snapshot: &'a Snapshot) -> Option<&'a T> {
        self.variable
            .read(snapshot)
            .and_then(ContextValue::downcast_ref::<T>)
    }

    /// Owned copy of the visible value
    #[must_use]
    pub fn get_cloned(&self, snapshot: &Snapshot) -> Option<T>
    where
        T: Clone,
    {
        self.get(snapshot).cloned()
    }

    /// Derive a snapshot with this variable set to `value`
    #[must_use]
    pub fn derive(&self, snapshot: &Snapshot, value: T) -> Snapshot {
        snapshot.with_value(self.id(), ContextValue::new(value))
    }
}

impl<T> Clone for ContextVar<T> {
    fn clone(&self) -> Self {
        Self {
            variable: self.variable.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ContextVar<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextVar").field(&self.variable).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VariableRegistry;

    #[test]
    fn key_borrows_as_str() {
        let key = VariableKey::from("locale");
        assert_eq!(key.as_str(), "locale");
        let b: &str = key.borrow();
        assert_eq!(b, "locale");
        assert_eq!(VariableKey::from(String::from("locale")), key);
    }

    #[test]
    fn read_falls_back_to_default() {
        let registry = VariableRegistry::new();
        let locale = registry
            .declare_typed("locale", Some(String::from("en")), MergeStrategy::SourceGraph)
            .unwrap();
        let empty = Snapshot::bootstrap();
        assert_eq!(locale.get(&empty).map(String::as_str), Some("en"));

        let fr = locale.derive(&empty, String::from("fr"));
        assert_eq!(locale.get_cloned(&fr).as_deref(), Some("fr"));
    }

    #[test]
    fn check_rejects_wrong_type() {
        let registry = VariableRegistry::new();
        let depth = registry
            .declare_typed::<u32>("depth", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        assert!(depth.variable().check(&ContextValue::new(1_u32)).is_ok());
        let err = depth.variable().check(&ContextValue::new("one")).unwrap_err();
        assert!(matches!(err, RegistryError::TypeMismatch { .. }));
    }

    #[test]
    fn untyped_variable_accepts_anything() {
        let registry = VariableRegistry::new();
        let any = registry
            .declare("anything", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        assert!(any.check(&ContextValue::new(1_u8)).is_ok());
        assert!(any.check(&ContextValue::new("s")).is_ok());
        assert!(any.type_name().is_none());
    }
}
