//! Schema and unit normalization.
//! See ARCHITECTURE.md §3 (canonical schema mapping)
//!
//! Every mapper takes one raw provider item and returns `Some(PriceRecord)`
//! or `None` — an item without a usable price is skipped, never an error.
//! Unit canonicalization is a two-stage lookup: raw spelling → internal unit
//! key, then key → display unit. Per-second rates are re-expressed per hour
//! before the display stage so the catalog has one time granularity.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use stratus_common::model::{PriceRecord, Provider};

/// Raw unit spellings → internal unit key. Spellings are matched after
/// trimming and lowercasing.
const UNIT_SYNONYMS: &[(&str, &str)] = &[
    ("hr", "hour"),
    ("hrs", "hour"),
    ("hour", "hour"),
    ("hours", "hour"),
    ("1 hour", "hour"),
    ("h", "hour"),
    ("second", "second"),
    ("seconds", "second"),
    ("sec", "second"),
    ("secs", "second"),
    ("s", "second"),
    ("gb-mo", "gb_month"),
    ("gb-month", "gb_month"),
    ("gb/month", "gb_month"),
    ("gb month", "gb_month"),
    ("giby.mo", "gb_month"),
    ("gibibyte month", "gb_month"),
    ("1 gb/month", "gb_month"),
    ("gb", "gb"),
    ("giby", "gb"),
    ("1 gb", "gb"),
    ("month", "month"),
    ("1/month", "month"),
    ("1k requests", "requests_1k"),
    ("1000 requests", "requests_1k"),
    ("10k requests", "requests_10k"),
    ("10000 requests", "requests_10k"),
];

/// Internal unit key → canonical display unit.
const UNIT_DISPLAY: &[(&str, &str)] = &[
    ("hour", "$/Stunde"),
    ("gb_month", "$/GB/Monat"),
    ("gb", "$/GB"),
    ("month", "$/Monat"),
    ("requests_1k", "$/1K Anfragen"),
    ("requests_10k", "$/10K Anfragen"),
];

/// Seconds per hour; per-second prices are scaled up to the hourly baseline.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Instance-type length cap carried over from the relational column width.
const INSTANCE_TYPE_MAX: usize = 100;

fn unit_key(raw: &str) -> Option<&'static str> {
    let needle = raw.trim().to_lowercase();
    UNIT_SYNONYMS
        .iter()
        .find(|(spelling, _)| *spelling == needle)
        .map(|(_, key)| *key)
}

fn display_unit(key: &str) -> Option<&'static str> {
    UNIT_DISPLAY
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, display)| *display)
}

/// Canonicalize a raw unit and convert the price where the unit demands it.
/// Unrecognized raw units pass through unchanged so an unexpected spelling
/// never crashes the pipeline.
pub fn canonical_unit(raw_unit: &str, price: f64) -> (String, f64) {
    match unit_key(raw_unit) {
        Some(mut key) => {
            let mut price = price;
            if key == "second" {
                price *= SECONDS_PER_HOUR;
                key = "hour";
            }
            match display_unit(key) {
                Some(display) => (display.to_string(), price),
                None => (raw_unit.to_string(), price),
            }
        }
        None => (raw_unit.to_string(), price),
    }
}

/// Final assembly shared by all mappers: canonicalize, then apply the
/// positivity invariant.
#[allow(clippy::too_many_arguments)]
fn finish(
    provider: Provider,
    service: String,
    sku: String,
    instance_type: Option<String>,
    resource_name: String,
    region: String,
    price: f64,
    raw_unit: &str,
    currency: String,
) -> Option<PriceRecord> {
    let (unit, price) = canonical_unit(raw_unit, price);
    if price <= 0.0 {
        trace!(provider = provider.as_str(), %sku, price, "dropping non-positive price");
        return None;
    }
    Some(PriceRecord {
        provider,
        service,
        sku,
        instance_type,
        resource_name,
        region,
        price_per_unit: price,
        unit,
        currency,
    })
}

/// Dispatch by provider. AWS offers can expand to several price dimensions;
/// this single-record contract keeps the first — the AWS source uses
/// [`map_aws_offer`] directly.
pub fn normalize(provider: Provider, item: &Value) -> Option<PriceRecord> {
    match provider {
        Provider::Azure => map_azure_item(item),
        Provider::Gcp => map_gcp_sku(item, None),
        Provider::Aws => map_aws_offer(item).into_iter().next(),
    }
}

// ── Azure ─────────────────────────────────────────────────────────────────────

/// Map one Azure Retail Prices item.
pub fn map_azure_item(item: &Value) -> Option<PriceRecord> {
    let price = item["retailPrice"].as_f64()?;
    let sku = item["skuName"].as_str()?.to_string();

    let resource_name = item["productName"]
        .as_str()
        .filter(|s| !s.is_empty())
        .unwrap_or(&sku)
        .to_string();

    finish(
        Provider::Azure,
        str_or(item, "serviceName", "unknown"),
        sku,
        item["armSkuName"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from),
        resource_name,
        str_or(item, "armRegionName", "unknown"),
        price,
        item["unitOfMeasure"].as_str().unwrap_or(""),
        str_or(item, "currencyCode", "USD"),
    )
}

// ── AWS ───────────────────────────────────────────────────────────────────────

/// Map one AWS Price List offer. One offer carries an OnDemand term map with
/// nested price dimensions, each of which becomes its own record.
pub fn map_aws_offer(offer: &Value) -> Vec<PriceRecord> {
    let product = &offer["product"];
    let Some(sku) = product["sku"].as_str() else {
        return Vec::new();
    };

    let service = product["productFamily"].as_str().unwrap_or("unknown");
    let attributes = &product["attributes"];
    let region = attributes["location"].as_str().unwrap_or("unknown");
    let instance_type = attributes["instanceType"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(String::from);

    let Some(terms) = offer["terms"]["OnDemand"].as_object() else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for term in terms.values() {
        let Some(dimensions) = term["priceDimensions"].as_object() else {
            continue;
        };
        for dimension in dimensions.values() {
            let Some(price) = number_or_string_f64(&dimension["pricePerUnit"]["USD"]) else {
                continue;
            };
            let resource_name = if service != "unknown" {
                service.to_string()
            } else {
                dimension["description"]
                    .as_str()
                    .unwrap_or("unknown")
                    .to_string()
            };
            if let Some(record) = finish(
                Provider::Aws,
                service.to_string(),
                sku.to_string(),
                instance_type.clone(),
                resource_name,
                region.to_string(),
                price,
                dimension["unit"].as_str().unwrap_or(""),
                "USD".to_string(),
            ) {
                records.push(record);
            }
        }
    }
    records
}

// ── GCP ───────────────────────────────────────────────────────────────────────

/// Map one Cloud Billing SKU, optionally forcing the service label (the
/// sub-service pipelines pin it, e.g. "Persistent Disk" for filtered
/// Compute Engine SKUs).
pub fn map_gcp_sku(item: &Value, service_label_override: Option<&str>) -> Option<PriceRecord> {
    let (price, raw_unit, currency) = gcp_unit_price(&item["pricingInfo"])?;

    let description = item["description"].as_str().unwrap_or("");
    let category = &item["category"];

    let region = match item["serviceRegions"].as_array() {
        Some(regions) if !regions.is_empty() => regions
            .iter()
            .filter_map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(","),
        _ => "unknown".to_string(),
    };

    let service = service_label_override
        .map(String::from)
        .or_else(|| non_empty(category["serviceDisplayName"].as_str()))
        .or_else(|| non_empty(category["resourceFamily"].as_str()))
        .unwrap_or_else(|| "unknown".to_string());

    let instance_type = extract_machine_token(description)
        .or_else(|| non_empty(category["resourceGroup"].as_str()))
        .or_else(|| non_empty(category["resourceFamily"].as_str()))
        .map(|t| truncate_chars(&t, INSTANCE_TYPE_MAX));

    let sku = str_or(item, "skuId", "unknown");
    let resource_name = if description.is_empty() {
        sku.clone()
    } else {
        description.to_string()
    };

    finish(
        Provider::Gcp,
        service,
        sku,
        instance_type,
        resource_name,
        region,
        price,
        &raw_unit,
        currency,
    )
}

/// Read the first tiered rate out of a SKU's pricing info. Returns the
/// price, raw usage unit, and currency — or `None` when the SKU carries no
/// positive price.
pub fn gcp_unit_price(pricing_info: &Value) -> Option<(f64, String, String)> {
    let expr = match pricing_info {
        Value::Array(list) => &list.first()?["pricingExpression"],
        other => &other["pricingExpression"],
    };

    let unit_price = &expr["tieredRates"].as_array()?.first()?["unitPrice"];
    let units = number_or_string_f64(&unit_price["units"]).unwrap_or(0.0);
    let nanos = unit_price["nanos"].as_f64().unwrap_or(0.0);
    let price = units + nanos / 1e9;
    if price <= 0.0 {
        return None;
    }

    Some((
        price,
        expr["usageUnit"].as_str().unwrap_or("unit").to_string(),
        expr["currencyCode"].as_str().unwrap_or("USD").to_string(),
    ))
}

/// Recognize a GCP machine token like "n1-standard-1" or "e2-medium" inside
/// a free-text description. Best-effort; prose with short hyphenated words
/// can misfire.
pub fn extract_machine_token(description: &str) -> Option<String> {
    static MACHINE_TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = MACHINE_TOKEN.get_or_init(|| {
        Regex::new(r"\b([a-z0-9]{1,8}-[a-z]+(?:-[a-z0-9]+)?)\b").expect("machine token regex")
    });
    re.find(&description.to_lowercase())
        .map(|m| truncate_chars(m.as_str(), INSTANCE_TYPE_MAX))
}

// ── Small helpers ─────────────────────────────────────────────────────────────

fn str_or(item: &Value, field: &str, fallback: &str) -> String {
    item[field]
        .as_str()
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(String::from)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// AWS serializes prices as strings, GCP's `units` field likewise; accept
/// both JSON numbers and numeric strings.
fn number_or_string_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_per_second_price_becomes_hourly() {
        let (unit, price) = canonical_unit("seconds", 0.01);
        assert_eq!(unit, "$/Stunde");
        assert_eq!(price, 36.0);
    }

    #[test]
    fn test_unit_synonyms_collapse_to_one_display() {
        for raw in ["hr", "Hrs", " 1 Hour ", "hours"] {
            let (unit, price) = canonical_unit(raw, 1.5);
            assert_eq!(unit, "$/Stunde", "raw spelling {raw:?}");
            assert_eq!(price, 1.5);
        }
        assert_eq!(canonical_unit("GB-Mo", 2.0).0, "$/GB/Monat");
        assert_eq!(canonical_unit("1K Requests", 2.0).0, "$/1K Anfragen");
    }

    #[test]
    fn test_unrecognized_unit_passes_through() {
        let (unit, price) = canonical_unit("IOPS-Mo", 4.2);
        assert_eq!(unit, "IOPS-Mo");
        assert_eq!(price, 4.2);
    }

    #[test]
    fn test_azure_item_maps_and_converts_unit() {
        let item = json!({
            "serviceName": "Virtual Machines",
            "skuName": "D2s v3",
            "armSkuName": "Standard_D2s_v3",
            "productName": "Virtual Machines Dsv3 Series",
            "armRegionName": "germanywestcentral",
            "retailPrice": 0.113,
            "unitOfMeasure": "1 Hour",
            "currencyCode": "USD"
        });
        let record = map_azure_item(&item).unwrap();
        assert_eq!(record.provider, Provider::Azure);
        assert_eq!(record.sku, "D2s v3");
        assert_eq!(record.instance_type.as_deref(), Some("Standard_D2s_v3"));
        assert_eq!(record.unit, "$/Stunde");
        assert_eq!(record.price_per_unit, 0.113);
    }

    #[test]
    fn test_azure_zero_price_is_dropped() {
        let item = json!({
            "serviceName": "Virtual Machines",
            "skuName": "Free Tier",
            "productName": "Something free",
            "armRegionName": "westeurope",
            "retailPrice": 0.0,
            "unitOfMeasure": "1 Hour",
            "currencyCode": "USD"
        });
        assert!(map_azure_item(&item).is_none());
    }

    #[test]
    fn test_negative_after_conversion_is_dropped() {
        let item = json!({
            "serviceName": "Virtual Machines",
            "skuName": "Broken",
            "productName": "Broken",
            "armRegionName": "westeurope",
            "retailPrice": -0.5,
            "unitOfMeasure": "seconds",
            "currencyCode": "USD"
        });
        assert!(map_azure_item(&item).is_none());
    }

    #[test]
    fn test_aws_offer_expands_price_dimensions() {
        let offer = json!({
            "product": {
                "sku": "ABCD1234",
                "productFamily": "Compute Instance",
                "attributes": {
                    "location": "EU (Frankfurt)",
                    "instanceType": "t3.micro"
                }
            },
            "terms": {
                "OnDemand": {
                    "ABCD1234.JRTCKXETXF": {
                        "priceDimensions": {
                            "ABCD1234.JRTCKXETXF.6YS6EN2CT7": {
                                "unit": "Hrs",
                                "description": "$0.0104 per On Demand Linux t3.micro",
                                "pricePerUnit": { "USD": "0.0104000000" }
                            },
                            "ABCD1234.JRTCKXETXF.ZERO": {
                                "unit": "Hrs",
                                "description": "free tier",
                                "pricePerUnit": { "USD": "0.0000000000" }
                            }
                        }
                    }
                }
            }
        });
        let records = map_aws_offer(&offer);
        assert_eq!(records.len(), 1, "zero-priced dimension must be dropped");
        let r = &records[0];
        assert_eq!(r.sku, "ABCD1234");
        assert_eq!(r.instance_type.as_deref(), Some("t3.micro"));
        assert_eq!(r.region, "EU (Frankfurt)");
        assert_eq!(r.unit, "$/Stunde");
        assert!((r.price_per_unit - 0.0104).abs() < 1e-12);
    }

    #[test]
    fn test_aws_offer_without_terms_is_empty() {
        let offer = json!({ "product": { "sku": "X" }, "terms": {} });
        assert!(map_aws_offer(&offer).is_empty());
    }

    #[test]
    fn test_gcp_sku_maps_units_nanos_and_regions() {
        let sku = json!({
            "skuId": "6F81-5844-456A",
            "description": "N1 Predefined Instance Core running in Americas",
            "category": {
                "serviceDisplayName": "Compute Engine",
                "resourceFamily": "Compute",
                "resourceGroup": "CPU"
            },
            "serviceRegions": ["us-central1", "us-east1"],
            "pricingInfo": [{
                "pricingExpression": {
                    "usageUnit": "h",
                    "currencyCode": "USD",
                    "tieredRates": [{
                        "unitPrice": { "units": "0", "nanos": 31611000 }
                    }]
                }
            }]
        });
        let record = map_gcp_sku(&sku, None).unwrap();
        assert_eq!(record.service, "Compute Engine");
        assert_eq!(record.region, "us-central1,us-east1");
        assert_eq!(record.unit, "$/Stunde");
        assert!((record.price_per_unit - 0.031611).abs() < 1e-12);
        // "n1-standard"-like token not present; falls back to resourceGroup.
        assert_eq!(record.instance_type.as_deref(), Some("CPU"));
    }

    #[test]
    fn test_gcp_per_second_sku_is_rescaled() {
        let sku = json!({
            "skuId": "AAAA-BBBB-CCCC",
            "description": "E2 Instance Core running in EMEA, e2-standard-4",
            "category": { "resourceFamily": "Compute" },
            "serviceRegions": ["europe-west1"],
            "pricingInfo": [{
                "pricingExpression": {
                    "usageUnit": "s",
                    "currencyCode": "USD",
                    "tieredRates": [{
                        "unitPrice": { "units": 0, "nanos": 10000 }
                    }]
                }
            }]
        });
        let record = map_gcp_sku(&sku, Some("Compute Engine")).unwrap();
        assert_eq!(record.unit, "$/Stunde");
        assert!((record.price_per_unit - 0.00001 * 3600.0).abs() < 1e-12);
        assert_eq!(record.instance_type.as_deref(), Some("e2-standard-4"));
    }

    #[test]
    fn test_gcp_sku_without_tiered_rates_is_skipped() {
        let sku = json!({
            "skuId": "NOPE",
            "description": "Promo",
            "pricingInfo": [{ "pricingExpression": { "tieredRates": [] } }]
        });
        assert!(map_gcp_sku(&sku, None).is_none());
    }

    #[test]
    fn test_machine_token_extraction() {
        assert_eq!(
            extract_machine_token("N1 Standard running n1-standard-1 in EU").as_deref(),
            Some("n1-standard-1")
        );
        assert_eq!(
            extract_machine_token("Storage PD Capacity pd-ssd").as_deref(),
            Some("pd-ssd")
        );
        assert_eq!(extract_machine_token("Plain words only"), None);
    }
}
