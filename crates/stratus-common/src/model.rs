//! Canonical catalog data model.
//! See ARCHITECTURE.md §1 (canonical schema)

use serde::{Deserialize, Serialize};

/// Cloud providers the catalog ingests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "Azure")]
    Azure,
    #[serde(rename = "GCP")]
    Gcp,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws   => "AWS",
            Provider::Azure => "Azure",
            Provider::Gcp   => "GCP",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized catalog entry. Immutable after creation; the store upserts
/// on the `(provider, sku)` natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub provider: Provider,
    /// Logical product family, e.g. "Compute Engine" or "Virtual Machines".
    pub service: String,
    /// Provider-assigned stable identifier.
    pub sku: String,
    /// Short resource-variant code (e.g. "t3.micro"); `None` when the
    /// provider exposes nothing derivable.
    pub instance_type: Option<String>,
    pub resource_name: String,
    /// Free-text location string. Multi-region GCP SKUs carry a
    /// comma-joined list, "unknown" when the provider supplies none.
    pub region: String,
    /// Invariant: strictly positive once a record reaches the store.
    pub price_per_unit: f64,
    /// Canonical display unit produced by the normalizer, never the raw
    /// provider spelling (unless the raw unit was unrecognized).
    pub unit: String,
    pub currency: String,
}

impl PriceRecord {
    /// Display form of the instance type, "unknown" when absent.
    pub fn instance_type_display(&self) -> &str {
        self.instance_type.as_deref().unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trip() {
        let json = serde_json::to_string(&Provider::Gcp).unwrap();
        assert_eq!(json, "\"GCP\"");
        let back: Provider = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Provider::Gcp);
    }

    #[test]
    fn test_instance_type_display_fallback() {
        let record = PriceRecord {
            provider: Provider::Azure,
            service: "Virtual Machines".to_string(),
            sku: "D2s v3".to_string(),
            instance_type: None,
            resource_name: "Dsv3 Series".to_string(),
            region: "germanywestcentral".to_string(),
            price_per_unit: 0.1,
            unit: "$/Stunde".to_string(),
            currency: "USD".to_string(),
        };
        assert_eq!(record.instance_type_display(), "unknown");
    }
}
