//! Catalog read access for the alternatives engine.
//! See ARCHITECTURE.md §6 (store collaborator)

use std::sync::Arc;

use async_trait::async_trait;

use stratus_common::model::Provider;
use stratus_db::store::{PriceStore, StoredPrice};
use stratus_db::StoreError;

/// The two catalog reads the alternatives engine needs.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn get_by_id(&self, id: u64) -> Result<Option<StoredPrice>, StoreError>;

    /// All rows of one provider with an exactly matching service name.
    async fn records_for(
        &self,
        provider: Provider,
        service: &str,
    ) -> Result<Vec<StoredPrice>, StoreError>;
}

/// Adapter over any [`PriceStore`].
pub struct StoreCatalog {
    store: Arc<dyn PriceStore>,
}

impl StoreCatalog {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CatalogSource for StoreCatalog {
    async fn get_by_id(&self, id: u64) -> Result<Option<StoredPrice>, StoreError> {
        self.store.get_by_id(id).await
    }

    async fn records_for(
        &self,
        provider: Provider,
        service: &str,
    ) -> Result<Vec<StoredPrice>, StoreError> {
        self.store.by_provider_service(provider, service).await
    }
}

/// Fixed in-memory catalog for tests.
#[derive(Default)]
pub struct MockCatalog {
    rows: Vec<StoredPrice>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(mut self, row: StoredPrice) -> Self {
        self.rows.push(row);
        self
    }
}

#[async_trait]
impl CatalogSource for MockCatalog {
    async fn get_by_id(&self, id: u64) -> Result<Option<StoredPrice>, StoreError> {
        Ok(self.rows.iter().find(|r| r.id == id).cloned())
    }

    async fn records_for(
        &self,
        provider: Provider,
        service: &str,
    ) -> Result<Vec<StoredPrice>, StoreError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.record.provider == provider && r.record.service == service)
            .cloned()
            .collect())
    }
}
