//! Store trait and query surface.
//! See ARCHITECTURE.md §6 (store collaborator)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stratus_common::model::{PriceRecord, Provider};

use crate::error::StoreError;

/// Rows a catalog page shows at once.
pub const PAGE_SIZE: usize = 40;

/// Hard cap a single filtered query may return.
pub const QUERY_CAP: usize = 100;

/// A persisted record plus its store-assigned id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPrice {
    pub id: u64,
    pub record: PriceRecord,
}

/// Substring filters for the catalog query, all case-insensitive.
/// Empty/absent fields match everything.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub provider: Option<String>,
    pub service: Option<String>,
    pub sku: Option<String>,
    pub resource_name: Option<String>,
}

impl QueryFilter {
    pub fn matches(&self, row: &StoredPrice) -> bool {
        contains_ci(row.record.provider.as_str(), &self.provider)
            && contains_ci(&row.record.service, &self.service)
            && contains_ci(&row.record.sku, &self.sku)
            && contains_ci(&row.record.resource_name, &self.resource_name)
    }
}

fn contains_ci(haystack: &str, needle: &Option<String>) -> bool {
    match needle {
        Some(n) if !n.is_empty() => haystack.to_lowercase().contains(&n.to_lowercase()),
        _ => true,
    }
}

/// Whitelisted sort columns; anything else falls back to `Provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Provider,
    Service,
    Sku,
    ResourceName,
    Region,
    PricePerUnit,
}

impl SortField {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "service"        => SortField::Service,
            "sku"            => SortField::Sku,
            "resource_name"  => SortField::ResourceName,
            "region"         => SortField::Region,
            "price_per_unit" => SortField::PricePerUnit,
            _                => SortField::Provider,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Destination of normalized batches and source of catalog reads.
///
/// `upsert` resolves conflicts on the `(provider, sku)` natural key by
/// updating the mutable fields in place, so re-ingestion never piles up
/// duplicate rows. Implementations must tolerate concurrent upserts from
/// independent provider batches.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn upsert(
        &self,
        records: &[PriceRecord],
        provider: Provider,
    ) -> Result<usize, StoreError>;

    /// Filtered, sorted, paginated catalog read. `page` is 1-based.
    async fn query(
        &self,
        filter: &QueryFilter,
        sort: SortField,
        order: SortOrder,
        page: usize,
    ) -> Result<Vec<StoredPrice>, StoreError>;

    async fn get_by_id(&self, id: u64) -> Result<Option<StoredPrice>, StoreError>;

    /// Candidate pool read for the alternatives engine: all rows of one
    /// provider with an exactly matching service name.
    async fn by_provider_service(
        &self,
        provider: Provider,
        service: &str,
    ) -> Result<Vec<StoredPrice>, StoreError>;
}
