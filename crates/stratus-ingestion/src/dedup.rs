//! Duplicate suppression across provider pipelines.
//! See ARCHITECTURE.md §3
//!
//! Two records are duplicates when they agree on provider, service, SKU,
//! resource name, and region after trimming and lowercasing, and their
//! prices agree to six decimal places. The first occurrence wins; input
//! order is preserved.

use std::collections::HashSet;

use tracing::debug;

use stratus_common::model::PriceRecord;

/// Price agreement granularity: six decimal places.
const PRICE_SCALE: f64 = 1e6;

#[derive(Debug, PartialEq, Eq, Hash)]
struct DedupKey {
    provider: &'static str,
    service: String,
    sku: String,
    resource_name: String,
    region: String,
    price_micros: i64,
}

fn key_of(record: &PriceRecord) -> DedupKey {
    DedupKey {
        provider: record.provider.as_str(),
        service: fold(&record.service),
        sku: fold(&record.sku),
        resource_name: fold(&record.resource_name),
        region: fold(&record.region),
        price_micros: (record.price_per_unit * PRICE_SCALE).round() as i64,
    }
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Drop duplicate records in place, keeping the first occurrence of each key.
pub fn dedup_records(records: Vec<PriceRecord>) -> Vec<PriceRecord> {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    let mut kept = Vec::with_capacity(before);
    for record in records {
        if seen.insert(key_of(&record)) {
            kept.push(record);
        }
    }
    if kept.len() < before {
        debug!(before, after = kept.len(), "suppressed duplicate records");
    }
    kept
}
