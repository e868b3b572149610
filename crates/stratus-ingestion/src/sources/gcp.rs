//! GCP Cloud Billing catalog source.
//!
//! Four pipelines: Compute Engine, Cloud Storage, Persistent Disk, and
//! Cloud SQL. The catalog is keyed by opaque service ids, so every pipeline
//! first resolves its service's id by display name from `/services`.
//! Persistent Disk has no catalog service of its own — it is carved out of
//! the Compute Engine SKUs by keyword.

use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use stratus_common::config::GcpConfig;
use stratus_common::error::FetchError;
use stratus_common::http::PacedClient;
use stratus_common::model::{PriceRecord, Provider};

use crate::normalize::map_gcp_sku;
use crate::paged::{collect_pages, Page};
use crate::sources::PricingSource;

pub const PIPELINE_COMPUTE_ENGINE: &str = "Compute Engine";
pub const PIPELINE_CLOUD_STORAGE: &str = "Cloud Storage";
pub const PIPELINE_PERSISTENT_DISK: &str = "Persistent Disk";
pub const PIPELINE_CLOUD_SQL: &str = "Cloud SQL";

pub struct GcpSource {
    client: PacedClient,
    cfg: GcpConfig,
    // (displayName, service id) pairs; resolved once per run, the four
    // pipelines share it.
    services: AsyncMutex<Option<Vec<(String, String)>>>,
}

impl GcpSource {
    pub fn new(client: PacedClient, cfg: GcpConfig) -> Self {
        Self {
            client,
            cfg,
            services: AsyncMutex::new(None),
        }
    }

    /// Resolve a catalog service id by display name, case-insensitively.
    async fn resolve_service_id(&self, display_name: &str) -> Result<Option<String>, FetchError> {
        let mut cache = self.services.lock().await;
        if cache.is_none() {
            *cache = Some(self.list_services().await?);
        }
        let services = cache.clone().unwrap_or_default();
        drop(cache);

        Ok(services
            .into_iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(display_name))
            .map(|(_, sid)| sid))
    }

    async fn list_services(&self) -> Result<Vec<(String, String)>, FetchError> {
        let url = format!("{}/services", self.cfg.endpoint);
        let raw = collect_pages(|token| {
            let url = url.clone();
            async move {
                let query: Vec<(String, String)> = token
                    .map(|t| vec![("pageToken".to_string(), t)])
                    .unwrap_or_default();
                let body = self.client.get_json(&url, &query).await?;
                Ok(Page {
                    items: body["services"].as_array().cloned().unwrap_or_default(),
                    next: next_page_token(&body),
                })
            }
        })
        .await?;

        let services = raw
            .iter()
            .filter_map(|s| {
                let display = s["displayName"].as_str()?;
                // Resource name is "services/{id}".
                let sid = s["name"].as_str()?.rsplit('/').next()?;
                Some((display.to_string(), sid.to_string()))
            })
            .collect::<Vec<_>>();
        debug!(services = services.len(), "gcp billing services listed");
        Ok(services)
    }

    async fn fetch_skus(&self, service_id: &str) -> Result<Vec<Value>, FetchError> {
        let url = format!("{}/services/{}/skus", self.cfg.endpoint, service_id);
        collect_pages(|token| {
            let url = url.clone();
            async move {
                let query: Vec<(String, String)> = token
                    .map(|t| vec![("pageToken".to_string(), t)])
                    .unwrap_or_default();
                let body = self.client.get_json(&url, &query).await?;
                Ok(Page {
                    items: body["skus"].as_array().cloned().unwrap_or_default(),
                    next: next_page_token(&body),
                })
            }
        })
        .await
    }

    /// Fetch a service's SKUs by display name and map them under `label`.
    /// An unresolvable service yields an empty pipeline, not an error.
    async fn mapped_skus(
        &self,
        display_name: &str,
        label: &str,
    ) -> Result<Vec<PriceRecord>, FetchError> {
        let Some(sid) = self.resolve_service_id(display_name).await? else {
            warn!(service = display_name, "gcp service not found in catalog");
            return Ok(Vec::new());
        };
        let skus = self.fetch_skus(&sid).await?;
        Ok(skus
            .iter()
            .filter_map(|sku| map_gcp_sku(sku, Some(label)))
            .collect())
    }

    async fn persistent_disk(&self) -> Result<Vec<PriceRecord>, FetchError> {
        let Some(sid) = self.resolve_service_id(PIPELINE_COMPUTE_ENGINE).await? else {
            warn!("gcp compute engine service not found; no persistent disk SKUs");
            return Ok(Vec::new());
        };
        let skus = self.fetch_skus(&sid).await?;
        Ok(skus
            .iter()
            .filter(|sku| is_persistent_disk_sku(sku))
            .filter_map(|sku| map_gcp_sku(sku, Some(PIPELINE_PERSISTENT_DISK)))
            .collect())
    }
}

fn next_page_token(body: &Value) -> Option<String> {
    body["nextPageToken"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Keyword carve-out of Persistent Disk SKUs from the Compute Engine catalog.
fn is_persistent_disk_sku(sku: &Value) -> bool {
    let category = &sku["category"];
    let text = format!(
        "{} {}",
        sku["description"].as_str().unwrap_or(""),
        category["resourceGroup"].as_str().unwrap_or("")
    )
    .to_lowercase();

    text.contains("persistent disk")
        || text.contains("pd-standard")
        || text.contains("pd-ssd")
        || text.contains("balanced pd")
        || text.contains("hyperdisk")
        || (category["resourceFamily"].as_str() == Some("Storage") && text.contains("disk"))
}

#[async_trait]
impl PricingSource for GcpSource {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    fn pipelines(&self) -> Vec<String> {
        vec![
            PIPELINE_COMPUTE_ENGINE.to_string(),
            PIPELINE_CLOUD_STORAGE.to_string(),
            PIPELINE_PERSISTENT_DISK.to_string(),
            PIPELINE_CLOUD_SQL.to_string(),
        ]
    }

    #[instrument(skip(self), fields(provider = "GCP"))]
    async fn fetch_pipeline(&self, pipeline: &str) -> Result<Vec<PriceRecord>, FetchError> {
        match pipeline {
            PIPELINE_COMPUTE_ENGINE | PIPELINE_CLOUD_STORAGE | PIPELINE_CLOUD_SQL => {
                self.mapped_skus(pipeline, pipeline).await
            }
            PIPELINE_PERSISTENT_DISK => self.persistent_disk().await,
            other => Err(FetchError::InvalidRequest(format!(
                "unknown gcp pipeline: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stratus_common::config::HttpConfig;
    use stratus_test_utils::{StubResponse, StubServer};

    fn source(endpoint: String) -> GcpSource {
        let http = HttpConfig {
            min_interval_ms: 0,
            jitter_ms: 0,
            ..HttpConfig::default()
        };
        GcpSource::new(PacedClient::new(&http).unwrap(), GcpConfig { endpoint })
    }

    fn sku(id: &str, description: &str, group: &str, family: &str) -> Value {
        json!({
            "skuId": id,
            "description": description,
            "category": {
                "serviceDisplayName": "Compute Engine",
                "resourceFamily": family,
                "resourceGroup": group
            },
            "serviceRegions": ["europe-west1"],
            "pricingInfo": [{
                "pricingExpression": {
                    "usageUnit": "h",
                    "currencyCode": "USD",
                    "tieredRates": [{ "unitPrice": { "units": "0", "nanos": 5000000 } }]
                }
            }]
        })
    }

    #[test]
    fn test_persistent_disk_keyword_filter() {
        assert!(is_persistent_disk_sku(&sku(
            "A", "Storage Persistent Disk Capacity", "SSD", "Storage"
        )));
        assert!(is_persistent_disk_sku(&sku(
            "B", "Balanced PD Capacity", "SSD", "Storage"
        )));
        assert!(is_persistent_disk_sku(&sku(
            "C", "Hyperdisk Throughput", "SSD", "Compute"
        )));
        assert!(is_persistent_disk_sku(&sku(
            "D", "Regional disk snapshot", "Disk", "Storage"
        )));
        assert!(!is_persistent_disk_sku(&sku(
            "E", "N1 Predefined Instance Core", "CPU", "Compute"
        )));
    }

    #[tokio::test]
    async fn test_resolves_service_id_then_pages_skus() {
        let services_page = json!({
            "services": [
                { "name": "services/95FF-2EF5-5EA1",
                  "displayName": "Cloud Storage" },
                { "name": "services/6F81-5844-456A",
                  "displayName": "Compute Engine" }
            ]
        })
        .to_string();
        let skus_page_one = json!({
            "skus": [sku("S1", "N1 Core running n1-standard-1", "CPU", "Compute")],
            "nextPageToken": "p2"
        })
        .to_string();
        let skus_page_two = json!({
            "skus": [sku("S2", "E2 Core", "CPU", "Compute")]
        })
        .to_string();

        let server = StubServer::start(vec![
            StubResponse::json(&services_page),
            StubResponse::json(&skus_page_one),
            StubResponse::json(&skus_page_two),
        ])
        .await;

        let records = source(server.url())
            .fetch_pipeline(PIPELINE_COMPUTE_ENGINE)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.service == "Compute Engine"));
        assert_eq!(records[0].instance_type.as_deref(), Some("n1-standard-1"));

        let paths = server.paths();
        assert!(paths[0].starts_with("/services"));
        assert!(paths[1].starts_with("/services/6F81-5844-456A/skus"));
        assert!(paths[2].contains("pageToken=p2"));
    }

    #[tokio::test]
    async fn test_unknown_service_yields_empty_pipeline() {
        let server = StubServer::start(vec![StubResponse::json(
            &json!({ "services": [] }).to_string(),
        )])
        .await;

        let records = source(server.url())
            .fetch_pipeline(PIPELINE_CLOUD_SQL)
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(server.hits(), 1, "no sku fetch without a service id");
    }

    #[tokio::test]
    async fn test_unknown_pipeline_is_invalid_request() {
        let server = StubServer::start(vec![StubResponse::status(500)]).await;
        let err = source(server.url()).fetch_pipeline("Spanner").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
        assert_eq!(server.hits(), 0);
    }
}
