//! Entity lifecycle callbacks invoked by repositories.

use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::lookup::{ComponentLookup, ComponentLookupExt};
use crate::mapping::PersistentEntity;
use crate::value::{EntityRecord, Row};

/// Hook into the save/load lifecycle of an entity.
pub trait EntityCallback: Send + Sync {
    /// Called with the row about to be written; may modify it.
    ///
    /// # Errors
    /// An error aborts the save.
    fn before_save(&self, _entity: &PersistentEntity, _row: &mut Row) -> Result<()> {
        Ok(())
    }

    /// Called with every record a repository returns.
    ///
    /// # Errors
    /// An error aborts the load.
    fn after_load(&self, _entity: &PersistentEntity, _record: &mut EntityRecord) -> Result<()> {
        Ok(())
    }
}

/// Ordered set of callbacks, invoked in registration order.
#[derive(Clone, Default)]
pub struct EntityCallbacks {
    callbacks: Vec<Arc<dyn EntityCallback>>,
}

impl EntityCallbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the registry from a lookup service: the registered
    /// `EntityCallbacks`, or an empty set.
    #[must_use]
    pub fn create(lookup: &dyn ComponentLookup) -> Self {
        lookup
            .lookup_optional::<EntityCallbacks>()
            .map(|found| found.as_ref().clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn with(mut self, callback: Arc<dyn EntityCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// # Errors
    /// Returns the first callback error.
    pub fn before_save(&self, entity: &PersistentEntity, row: &mut Row) -> Result<()> {
        for callback in &self.callbacks {
            callback.before_save(entity, row)?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns the first callback error.
    pub fn after_load(&self, entity: &PersistentEntity, record: &mut EntityRecord) -> Result<()> {
        for callback in &self.callbacks {
            callback.after_load(entity, record)?;
        }
        Ok(())
    }
}

impl fmt::Debug for EntityCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCallbacks")
            .field("len", &self.callbacks.len())
            .finish()
    }
}
