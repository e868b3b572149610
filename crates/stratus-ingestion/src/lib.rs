//! stratus-ingestion — provider pricing ingestion pipeline.
//!
//! - Paginated fetch from each provider's pricing API (paced, retried)
//! - Normalization into the canonical `PriceRecord` schema
//! - Unit canonicalization and per-second → per-hour conversion
//! - Cross-provider deduplication
//! - Concurrent per-provider orchestration with failure isolation

pub mod dedup;
pub mod normalize;
pub mod paged;
pub mod pipeline;
pub mod sources;

pub use pipeline::{run_ingestion, IngestReport, ProviderOutcome};
pub use sources::PricingSource;
