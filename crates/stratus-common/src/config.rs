//! Catalog configuration.
//!
//! Loaded from `stratus.toml`; every section is optional and falls back to
//! compiled-in defaults, so a missing file is not an error. Credentials are
//! NOT configured here — they stay with the environment-injected clients.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Complete catalog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StratusConfig {
    /// Pacing, retry, and timeout knobs shared by all provider clients.
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub gcp: GcpConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl StratusConfig {
    /// Load from a TOML file. A missing file yields the defaults; a present
    /// but malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

// ── Runtime ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Seconds between ingestion cycles; 0 runs a single cycle and exits.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// File the refresh timestamp is written to after each cycle.
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            status_path: default_status_path(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 { 0 }
fn default_status_path() -> String { "last_updated.txt".to_string() }

// ── HTTP pacing & retry ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Minimum wall-clock gap between two outbound calls of one client.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Upper bound of the random jitter added to pacing and backoff waits.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Per-request deadline; the only cancellation control.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the exponential backoff (base × 2^attempt).
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            jitter_ms: default_jitter_ms(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

fn default_min_interval_ms() -> u64 { 200 }
fn default_jitter_ms() -> u64 { 100 }
fn default_timeout_secs() -> u64 { 60 }
fn default_max_attempts() -> u32 { 5 }
fn default_base_backoff_ms() -> u64 { 250 }

// ── Provider endpoints & filter specs ─────────────────────────────────────────

/// One TERM_MATCH filter for the AWS Price List query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermFilter {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_aws_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_aws_service_code")]
    pub service_code: String,

    #[serde(default = "default_aws_filters")]
    pub filters: Vec<TermFilter>,

    #[serde(default = "default_aws_page_size")]
    pub page_size: u32,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_aws_endpoint(),
            service_code: default_aws_service_code(),
            filters: default_aws_filters(),
            page_size: default_aws_page_size(),
        }
    }
}

fn default_aws_endpoint() -> String {
    "https://api.pricing.us-east-1.amazonaws.com".to_string()
}
fn default_aws_service_code() -> String { "AmazonEC2".to_string() }
fn default_aws_filters() -> Vec<TermFilter> {
    vec![TermFilter {
        field: "instanceType".to_string(),
        value: "t3.micro".to_string(),
    }]
}
fn default_aws_page_size() -> u32 { 100 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default = "default_azure_endpoint")]
    pub endpoint: String,

    /// OData `$filter` expression sent with the first page only; follow-up
    /// pages come from the absolute `NextPageLink`.
    #[serde(default = "default_azure_filter")]
    pub filter: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: default_azure_endpoint(),
            filter: default_azure_filter(),
        }
    }
}

fn default_azure_endpoint() -> String {
    "https://prices.azure.com/api/retail/prices".to_string()
}
fn default_azure_filter() -> String {
    "serviceName eq 'Virtual Machines' and armRegionName eq 'germanywestcentral'".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Cloud Billing catalog root, without a trailing slash.
    #[serde(default = "default_gcp_endpoint")]
    pub endpoint: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self { endpoint: default_gcp_endpoint() }
    }
}

fn default_gcp_endpoint() -> String {
    "https://cloudbilling.googleapis.com/v1".to_string()
}
