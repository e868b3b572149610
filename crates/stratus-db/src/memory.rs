//! In-memory reference store.
//!
//! Keyed on `(provider, sku)` like the relational table's unique index.
//! Insertion order is preserved so re-ingestion keeps row identity stable.

use std::cmp::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;

use stratus_common::model::{PriceRecord, Provider};

use crate::error::StoreError;
use crate::store::{
    PriceStore, QueryFilter, SortField, SortOrder, StoredPrice, PAGE_SIZE, QUERY_CAP,
};

#[derive(Default)]
struct Inner {
    rows: IndexMap<(Provider, String), StoredPrice>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Rejected("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn upsert(
        &self,
        records: &[PriceRecord],
        provider: Provider,
    ) -> Result<usize, StoreError> {
        let mut inner = self.lock()?;
        let mut updated = 0usize;

        for record in records {
            let key = (provider, record.sku.clone());
            if let Some(existing) = inner.rows.get_mut(&key) {
                existing.record.instance_type = record.instance_type.clone();
                existing.record.resource_name = record.resource_name.clone();
                existing.record.region = record.region.clone();
                existing.record.price_per_unit = record.price_per_unit;
                existing.record.unit = record.unit.clone();
                existing.record.currency = record.currency.clone();
                updated += 1;
            } else {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.rows.insert(
                    key,
                    StoredPrice {
                        id,
                        record: record.clone(),
                    },
                );
            }
        }

        debug!(
            provider = provider.as_str(),
            total = records.len(),
            updated,
            "batch upserted"
        );
        Ok(records.len())
    }

    async fn query(
        &self,
        filter: &QueryFilter,
        sort: SortField,
        order: SortOrder,
        page: usize,
    ) -> Result<Vec<StoredPrice>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<StoredPrice> = inner
            .rows
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        drop(inner);

        rows.sort_by(|a, b| {
            let cmp = compare(sort, a, b);
            match order {
                SortOrder::Asc => cmp,
                SortOrder::Desc => cmp.reverse(),
            }
        });
        rows.truncate(QUERY_CAP);

        let start = page.saturating_sub(1) * PAGE_SIZE;
        if start >= rows.len() {
            return Ok(Vec::new());
        }
        let end = (start + PAGE_SIZE).min(rows.len());
        Ok(rows[start..end].to_vec())
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<StoredPrice>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.rows.values().find(|row| row.id == id).cloned())
    }

    async fn by_provider_service(
        &self,
        provider: Provider,
        service: &str,
    ) -> Result<Vec<StoredPrice>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .rows
            .values()
            .filter(|row| row.record.provider == provider && row.record.service == service)
            .cloned()
            .collect())
    }
}

fn compare(sort: SortField, a: &StoredPrice, b: &StoredPrice) -> Ordering {
    match sort {
        SortField::Provider => a.record.provider.as_str().cmp(b.record.provider.as_str()),
        SortField::Service => a.record.service.cmp(&b.record.service),
        SortField::Sku => a.record.sku.cmp(&b.record.sku),
        SortField::ResourceName => a.record.resource_name.cmp(&b.record.resource_name),
        SortField::Region => a.record.region.cmp(&b.record.region),
        SortField::PricePerUnit => a
            .record
            .price_per_unit
            .partial_cmp(&b.record.price_per_unit)
            .unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(provider: Provider, sku: &str, price: f64) -> PriceRecord {
        PriceRecord {
            provider,
            service: "Compute".to_string(),
            sku: sku.to_string(),
            instance_type: None,
            resource_name: format!("{sku} resource"),
            region: "eu-west-1".to_string(),
            price_per_unit: price,
            unit: "$/Stunde".to_string(),
            currency: "USD".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place_on_natural_key() {
        let store = MemoryStore::new();
        store
            .upsert(&[record(Provider::Aws, "SKU-1", 1.0)], Provider::Aws)
            .await
            .unwrap();
        let first = store.get_by_id(1).await.unwrap().unwrap();
        assert_eq!(first.record.price_per_unit, 1.0);

        // Re-ingestion with a new price must not create a second row.
        store
            .upsert(&[record(Provider::Aws, "SKU-1", 2.5)], Provider::Aws)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        let updated = store.get_by_id(1).await.unwrap().unwrap();
        assert_eq!(updated.record.price_per_unit, 2.5);
    }

    #[tokio::test]
    async fn test_same_sku_different_provider_is_distinct() {
        let store = MemoryStore::new();
        store
            .upsert(&[record(Provider::Aws, "SKU-1", 1.0)], Provider::Aws)
            .await
            .unwrap();
        store
            .upsert(&[record(Provider::Gcp, "SKU-1", 1.0)], Provider::Gcp)
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_query_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        let batch: Vec<PriceRecord> = (0..50)
            .map(|i| record(Provider::Azure, &format!("SKU-{i:03}"), 50.0 - i as f64))
            .collect();
        store.upsert(&batch, Provider::Azure).await.unwrap();

        let filter = QueryFilter {
            provider: Some("azu".to_string()),
            ..QueryFilter::default()
        };
        let page1 = store
            .query(&filter, SortField::PricePerUnit, SortOrder::Asc, 1)
            .await
            .unwrap();
        assert_eq!(page1.len(), PAGE_SIZE);
        assert_eq!(page1[0].record.price_per_unit, 1.0);

        let page2 = store
            .query(&filter, SortField::PricePerUnit, SortOrder::Asc, 2)
            .await
            .unwrap();
        assert_eq!(page2.len(), 10);

        let none = store
            .query(
                &QueryFilter {
                    sku: Some("does-not-exist".to_string()),
                    ..QueryFilter::default()
                },
                SortField::Provider,
                SortOrder::Asc,
                1,
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_query_caps_result_set() {
        let store = MemoryStore::new();
        let batch: Vec<PriceRecord> = (0..150)
            .map(|i| record(Provider::Gcp, &format!("SKU-{i:04}"), 1.0 + i as f64))
            .collect();
        store.upsert(&batch, Provider::Gcp).await.unwrap();

        // Pages past the cap are empty even though more rows exist.
        let page4 = store
            .query(&QueryFilter::default(), SortField::Sku, SortOrder::Asc, 4)
            .await
            .unwrap();
        assert!(page4.is_empty(), "cap of {QUERY_CAP} rows implies 3 pages");
    }

    #[tokio::test]
    async fn test_by_provider_service_is_exact_match() {
        let store = MemoryStore::new();
        let mut a = record(Provider::Gcp, "A", 1.0);
        a.service = "Compute Engine".to_string();
        let mut b = record(Provider::Gcp, "B", 1.0);
        b.service = "Cloud SQL".to_string();
        store.upsert(&[a, b], Provider::Gcp).await.unwrap();

        let pool = store
            .by_provider_service(Provider::Gcp, "Compute Engine")
            .await
            .unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].record.sku, "A");
    }
}
