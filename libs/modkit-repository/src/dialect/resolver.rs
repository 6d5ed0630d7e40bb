use std::sync::Arc;

use super::{Dialect, DialectKind};
use crate::operations::SqlOperations;
use crate::{RepositoryError, Result};

/// Detects the dialect behind a raw operations handle.
pub trait DialectResolver: Send + Sync {
    /// # Errors
    /// Returns `RepositoryError::UnsupportedDialect` if the database product is
    /// not recognized, or `RepositoryError::Operations` if the probe fails.
    fn detect(&self, operations: &dyn SqlOperations) -> Result<Arc<dyn Dialect>>;
}

/// Resolves the built-in dialects from the product name reported by the handle.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDialectResolver;

impl DialectResolver for DefaultDialectResolver {
    fn detect(&self, operations: &dyn SqlOperations) -> Result<Arc<dyn Dialect>> {
        let product = operations.product_name()?;
        let kind = DialectKind::from_product_name(&product)
            .ok_or_else(|| RepositoryError::UnsupportedDialect {
                product: product.clone(),
            })?;

        tracing::debug!(product = %product, dialect = %kind, "Detected SQL dialect");
        Ok(kind.dialect())
    }
}
