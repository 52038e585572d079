use std::sync::Arc;
use tracing::debug;

use crate::database_ops::catalog::{CatalogStore, StoreError};

/// Canonical-URL existence check against the catalog.
///
/// This is advisory: two items resolving to the same URL can both pass it,
/// the unique constraint on insert is what settles the race.
#[derive(Clone)]
pub struct DedupChecker {
    catalog: Arc<dyn CatalogStore>,
}

impl DedupChecker {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    pub async fn exists(&self, url: &str) -> Result<bool, StoreError> {
        match self.catalog.get_by_url(url).await {
            Ok(existing) => {
                debug!(url, id = existing.id, "catalog already has url");
                Ok(true)
            }
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
