//! Type-erased context values
//!
//! Provides [`ContextValue`], the shared, immutable payload stored for one
//! variable inside a snapshot.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Shared, immutable, type-erased value of a context variable
///
/// Cloning shares the underlying allocation. Values are never mutated once
/// wrapped, so a snapshot holding one can be read from any thread.
#[derive(Clone)]
pub struct ContextValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ContextValue {
    /// Wrap a value
    #[inline]
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the value as `T`, if that is its type
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Check the stored type
    #[inline]
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// `TypeId` of the stored value
    #[inline]
    #[must_use]
    pub fn value_type_id(&self) -> TypeId {
        (*self.value).type_id()
    }

    /// Name of the stored type (diagnostics only)
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Identity comparison: both handles share one allocation
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}
