//! Scoring and ranking of substitute offerings.
//! See ARCHITECTURE.md §4
//!
//! Candidate pool: same provider and service as the base, region equal or
//! sharing the prefix before the first `-`, base excluded. Each candidate
//! is scored `family_penalty + |Δprice| / base_price`; exact family match
//! and smaller relative distance rank first, raw price breaks ties.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use stratus_common::family::family_token;
use stratus_db::store::StoredPrice;
use stratus_db::StoreError;

use crate::catalog::CatalogSource;

/// Denominator guard for a zero-priced base.
const EPSILON: f64 = 1e-9;

/// Candidates returned besides the base row.
const MAX_ALTERNATIVES: usize = 4;

#[derive(Debug, Error)]
pub enum AlternativesError {
    #[error("no catalog entry with id {0}")]
    NotFound(u64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaDirection {
    Down,
    Up,
    Same,
}

/// A catalog row scored against the base entry.
#[derive(Debug, Clone, Serialize)]
pub struct AlternativeCandidate {
    #[serde(flatten)]
    pub row: StoredPrice,
    pub score: f64,
    pub delta_abs: f64,
    pub delta_pct: f64,
    pub delta_direction: DeltaDirection,
}

/// Base row plus at most four ranked substitutes.
#[derive(Debug, Clone, Serialize)]
pub struct AlternativesPage {
    pub base: AlternativeCandidate,
    pub alternatives: Vec<AlternativeCandidate>,
}

impl AlternativesPage {
    /// Total rows shown, base included. Never exceeds five.
    pub fn row_count(&self) -> usize {
        1 + self.alternatives.len()
    }
}

/// Rank the closest substitutes for the catalog entry `base_id`.
pub async fn find_alternatives(
    catalog: &dyn CatalogSource,
    base_id: u64,
) -> Result<AlternativesPage, AlternativesError> {
    let base = catalog
        .get_by_id(base_id)
        .await?
        .ok_or(AlternativesError::NotFound(base_id))?;

    let pool = catalog
        .records_for(base.record.provider, &base.record.service)
        .await?;

    let base_family = family_of(&base);
    let base_price = base.record.price_per_unit;

    let mut scored: Vec<AlternativeCandidate> = pool
        .into_iter()
        .filter(|row| row.id != base.id)
        .filter(|row| regions_related(&base.record.region, &row.record.region))
        .map(|row| score_candidate(row, base_price, &base_family))
        .collect();

    scored.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then(a.row.record.price_per_unit.total_cmp(&b.row.record.price_per_unit))
    });
    scored.truncate(MAX_ALTERNATIVES);

    debug!(
        base_id,
        candidates = scored.len(),
        family = %base_family,
        "alternatives ranked"
    );

    Ok(AlternativesPage {
        base: AlternativeCandidate {
            row: base,
            score: -1.0,
            delta_abs: 0.0,
            delta_pct: 0.0,
            delta_direction: DeltaDirection::Same,
        },
        alternatives: scored,
    })
}

fn family_of(row: &StoredPrice) -> String {
    family_token(&format!("{} {}", row.record.resource_name, row.record.sku))
}

/// Regions are related when equal, or when they share the prefix before the
/// first `-` ("eu-west-1" ~ "eu-west-2"). Comparison is case-insensitive.
fn regions_related(base: &str, candidate: &str) -> bool {
    let base = base.trim().to_lowercase();
    let candidate = candidate.trim().to_lowercase();
    if base == candidate {
        return true;
    }
    match (base.split('-').next(), candidate.split('-').next()) {
        (Some(b), Some(c)) => b == c,
        _ => false,
    }
}

fn score_candidate(row: StoredPrice, base_price: f64, base_family: &str) -> AlternativeCandidate {
    let price = row.record.price_per_unit;
    let family = family_of(&row);

    let family_penalty = if !family.is_empty() && family == base_family {
        0.0
    } else {
        1.0
    };
    let denominator = if base_price == 0.0 { EPSILON } else { base_price };
    let delta_abs = price - base_price;
    let score = family_penalty + delta_abs.abs() / denominator;

    let delta_pct = if base_price == 0.0 {
        0.0
    } else {
        delta_abs / base_price * 100.0
    };
    let delta_direction = if delta_abs < 0.0 {
        DeltaDirection::Down
    } else if delta_abs > 0.0 {
        DeltaDirection::Up
    } else {
        DeltaDirection::Same
    };

    AlternativeCandidate {
        row,
        score,
        delta_abs,
        delta_pct,
        delta_direction,
    }
}
