//! Component lookup: optional, type-keyed access to externally configured roles.
//!
//! The stack never requires a lookup service. When one is present, every role
//! that was not supplied explicitly is first looked up here before a default
//! is built.
//!
//! Implementation details:
//! - Key = `type_name::<T>()`, which works for `T = dyn Trait`.
//! - Value = `Arc<T>` stored as `Arc<dyn Any + Send + Sync>` (downcast on read).
//! - Lookups are synchronous; a missing entry is absence, never an error.

use parking_lot::RwLock;
use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use crate::Result;

/// Stable type key for trait objects, using fully-qualified `type_name::<T>()`.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct TypeKey(&'static str);

impl TypeKey {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey(std::any::type_name::<T>())
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Type-erased component as stored by a lookup service: an `Arc<T>` inside an `Arc<dyn Any>`.
pub type ErasedComponent = Arc<dyn Any + Send + Sync>;

/// Object-safe lookup capability.
pub trait ComponentLookup: Send + Sync {
    /// Return the component registered under `key`, if any.
    fn lookup_erased(&self, key: TypeKey) -> Option<ErasedComponent>;
}

/// Typed access on top of any [`ComponentLookup`].
pub trait ComponentLookupExt: ComponentLookup {
    /// Look up a component by interface type; `None` when absent.
    fn lookup_optional<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let erased = self.lookup_erased(key)?;
        let found = erased.downcast_ref::<Arc<T>>().cloned();
        if found.is_none() {
            tracing::warn!(type_key = ?key, "Type mismatch in component lookup; treating as absent");
        }
        found
    }

    /// Look up a component, running `default` only when it is absent.
    ///
    /// # Errors
    /// Returns whatever `default` returns.
    fn lookup_or_else<T, F>(&self, default: F) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Result<Arc<T>>,
    {
        match self.lookup_optional::<T>() {
            Some(found) => Ok(found),
            None => default(),
        }
    }
}

impl<L: ComponentLookup + ?Sized> ComponentLookupExt for L {}

/// Type-safe registry of components keyed by interface type.
pub struct ComponentHub {
    map: RwLock<HashMap<TypeKey, ErasedComponent>>,
}

impl ComponentHub {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Register a component under the interface type `T`.
    /// `T` can be a trait object like `dyn Dialect`.
    pub fn register<T>(&self, component: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let erased: ErasedComponent = Arc::new(component);
        self.map.write().insert(TypeKey::of::<T>(), erased);
    }

    /// Remove a component; returns it if it was present.
    pub fn remove<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let erased = self.map.write().remove(&TypeKey::of::<T>())?;
        erased.downcast_ref::<Arc<T>>().cloned()
    }

    #[must_use]
    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.map.read().contains_key(&TypeKey::of::<T>())
    }

    /// Clear everything (useful in tests).
    pub fn clear(&self) {
        self.map.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Default for ComponentHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.read().keys()).finish()
    }
}

impl ComponentLookup for ComponentHub {
    fn lookup_erased(&self, key: TypeKey) -> Option<ErasedComponent> {
        self.map.read().get(&key).cloned()
    }
}
