//! AWS Price List source.
//!
//! Speaks the `GetProducts` JSON protocol: POST with an `X-Amz-Target`
//! header, TERM_MATCH filters in the body, `NextToken` continuation.
//! Each `PriceList` entry is itself a JSON string that has to be parsed
//! before the offer can be mapped; an unparseable entry is skipped.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use stratus_common::config::AwsConfig;
use stratus_common::error::FetchError;
use stratus_common::http::PacedClient;
use stratus_common::model::{PriceRecord, Provider};

use crate::normalize::map_aws_offer;
use crate::paged::{walk_pages, Page};
use crate::sources::PricingSource;

const GET_PRODUCTS_TARGET: &str = "AWSPriceListService.GetProducts";

pub struct AwsSource {
    client: PacedClient,
    cfg: AwsConfig,
}

impl AwsSource {
    pub fn new(client: PacedClient, cfg: AwsConfig) -> Self {
        Self { client, cfg }
    }

    fn request_body(&self, next_token: Option<String>) -> Value {
        let filters: Vec<Value> = self
            .cfg
            .filters
            .iter()
            .map(|f| {
                json!({
                    "Type": "TERM_MATCH",
                    "Field": f.field,
                    "Value": f.value
                })
            })
            .collect();

        let mut body = json!({
            "ServiceCode": self.cfg.service_code,
            "FormatVersion": "aws_v1",
            "MaxResults": self.cfg.page_size,
            "Filters": filters
        });
        if let Some(token) = next_token {
            body["NextToken"] = Value::String(token);
        }
        body
    }
}

#[async_trait]
impl PricingSource for AwsSource {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    fn pipelines(&self) -> Vec<String> {
        vec![self.cfg.service_code.clone()]
    }

    #[instrument(skip(self), fields(provider = "AWS"))]
    async fn fetch_pipeline(&self, _pipeline: &str) -> Result<Vec<PriceRecord>, FetchError> {
        let mut skipped = 0usize;
        let mut records = Vec::new();
        walk_pages(
            |next_token| {
                let body = self.request_body(next_token);
                let headers = [
                    ("X-Amz-Target", GET_PRODUCTS_TARGET.to_string()),
                    ("Content-Type", "application/x-amz-json-1.1".to_string()),
                ];
                async move {
                    let page = self
                        .client
                        .post_json(&self.cfg.endpoint, &body, &headers)
                        .await?;
                    let items = page["PriceList"].as_array().cloned().unwrap_or_default();
                    let next = page["NextToken"]
                        .as_str()
                        .filter(|s| !s.is_empty())
                        .map(String::from);
                    Ok(Page { items, next })
                }
            },
            |entries| {
                for entry in entries {
                    // Offers arrive double-encoded: JSON strings inside the
                    // PriceList array.
                    let offer = match entry.as_str() {
                        Some(raw) => match serde_json::from_str::<Value>(raw) {
                            Ok(offer) => offer,
                            Err(_) => {
                                skipped += 1;
                                continue;
                            }
                        },
                        None => entry,
                    };
                    records.extend(map_aws_offer(&offer));
                }
            },
        )
        .await?;

        if skipped > 0 {
            debug!(skipped, "unparseable PriceList entries dropped");
        }
        debug!(records = records.len(), "aws price list fetched");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_common::config::{HttpConfig, TermFilter};
    use stratus_test_utils::{StubResponse, StubServer};

    fn source(endpoint: String) -> AwsSource {
        let http = HttpConfig {
            min_interval_ms: 0,
            jitter_ms: 0,
            ..HttpConfig::default()
        };
        AwsSource::new(
            PacedClient::new(&http).unwrap(),
            AwsConfig {
                endpoint,
                service_code: "AmazonEC2".to_string(),
                filters: vec![TermFilter {
                    field: "instanceType".to_string(),
                    value: "t3.micro".to_string(),
                }],
                page_size: 100,
            },
        )
    }

    fn offer_string(sku: &str, price: &str) -> String {
        json!({
            "product": {
                "sku": sku,
                "productFamily": "Compute Instance",
                "attributes": { "location": "EU (Frankfurt)", "instanceType": "t3.micro" }
            },
            "terms": {
                "OnDemand": {
                    "t1": {
                        "priceDimensions": {
                            "d1": { "unit": "Hrs", "pricePerUnit": { "USD": price } }
                        }
                    }
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_paginates_with_next_token_and_parses_inner_json() {
        let server = StubServer::start(vec![
            StubResponse::json(
                &json!({
                    "PriceList": [offer_string("SKU1", "0.0104"), "not json"],
                    "NextToken": "t2"
                })
                .to_string(),
            ),
            StubResponse::json(
                &json!({ "PriceList": [offer_string("SKU2", "0.0208")] }).to_string(),
            ),
        ])
        .await;

        let records = source(server.url()).fetch_pipeline("AmazonEC2").await.unwrap();
        assert_eq!(server.hits(), 2);
        let skus: Vec<_> = records.iter().map(|r| r.sku.as_str()).collect();
        assert_eq!(skus, ["SKU1", "SKU2"]);
        assert_eq!(records[0].unit, "$/Stunde");
    }

    #[tokio::test]
    async fn test_http_error_surfaces_as_fetch_error() {
        let server = StubServer::start(vec![StubResponse::status(400)]).await;
        let err = source(server.url())
            .fetch_pipeline("AmazonEC2")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 400));
    }
}
