//! Azure Retail Prices source.
//!
//! Anonymous GET API. The `$filter` expression goes on the first request
//! only; every later page is fetched through the absolute `NextPageLink`
//! URL the API hands back, which already carries the filter.

use async_trait::async_trait;
use tracing::{debug, instrument};

use stratus_common::config::AzureConfig;
use stratus_common::error::FetchError;
use stratus_common::http::PacedClient;
use stratus_common::model::{PriceRecord, Provider};

use crate::normalize::map_azure_item;
use crate::paged::{walk_pages, Page};
use crate::sources::PricingSource;

pub struct AzureSource {
    client: PacedClient,
    cfg: AzureConfig,
}

impl AzureSource {
    pub fn new(client: PacedClient, cfg: AzureConfig) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl PricingSource for AzureSource {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn pipelines(&self) -> Vec<String> {
        vec!["retail-prices".to_string()]
    }

    #[instrument(skip(self), fields(provider = "Azure"))]
    async fn fetch_pipeline(&self, _pipeline: &str) -> Result<Vec<PriceRecord>, FetchError> {
        let mut records = Vec::new();
        let pages = walk_pages(
            |next| async move {
                let body = match next {
                    // NextPageLink is an absolute URL with the filter baked in.
                    Some(url) => self.client.get_json(&url, &[]).await?,
                    None => {
                        let query = [("$filter".to_string(), self.cfg.filter.clone())];
                        self.client.get_json(&self.cfg.endpoint, &query).await?
                    }
                };
                let items = body["Items"].as_array().cloned().unwrap_or_default();
                let next = body["NextPageLink"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .map(String::from);
                Ok(Page { items, next })
            },
            |items| {
                records.extend(items.iter().filter_map(map_azure_item));
            },
        )
        .await?;

        debug!(pages, records = records.len(), "azure retail prices fetched");
        Ok(records)
    }
}
