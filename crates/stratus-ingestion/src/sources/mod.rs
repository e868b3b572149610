//! Provider pricing sources.
//! See ARCHITECTURE.md §2
//!
//! Each source knows how to page through one provider's pricing API and map
//! the raw items into [`PriceRecord`]s. A source exposes one pipeline per
//! catalog it ingests; the orchestrator runs a source's pipelines
//! sequentially and providers concurrently.

use async_trait::async_trait;

use stratus_common::error::FetchError;
use stratus_common::model::{PriceRecord, Provider};

mod aws;
mod azure;
mod gcp;

pub use aws::AwsSource;
pub use azure::AzureSource;
pub use gcp::GcpSource;

#[async_trait]
pub trait PricingSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// The catalogs this source ingests, in execution order.
    fn pipelines(&self) -> Vec<String>;

    /// Fetch and normalize one pipeline end to end.
    async fn fetch_pipeline(&self, pipeline: &str) -> Result<Vec<PriceRecord>, FetchError>;
}
