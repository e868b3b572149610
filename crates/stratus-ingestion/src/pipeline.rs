//! Ingestion orchestrator.
//! See ARCHITECTURE.md §2
//!
//! Runs one ingestion cycle: every provider source fetches concurrently in
//! its own task, a source's pipelines run sequentially inside that task. A
//! provider failure is isolated — it surfaces in that provider's outcome
//! and never aborts the others. Pipelines that fail mid-provider still let
//! the provider's surviving pipelines contribute. The refresh timestamp is
//! written exactly once, after every provider has settled.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use stratus_common::model::Provider;
use stratus_db::status::StatusSink;
use stratus_db::store::PriceStore;

use crate::dedup::dedup_records;
use crate::sources::PricingSource;

/// What one provider contributed to a run.
#[derive(Debug, Clone)]
pub struct ProviderOutcome {
    pub provider: Provider,
    /// Records upserted into the store.
    pub count: usize,
    /// First error encountered, if any. A partial failure can coexist with
    /// a non-zero count.
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ProviderOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one full ingestion cycle.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub outcomes: Vec<ProviderOutcome>,
    pub total_upserted: usize,
    pub duration_ms: u64,
}

impl IngestReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(ProviderOutcome::succeeded)
    }
}

/// Run one ingestion cycle over the given sources.
pub async fn run_ingestion(
    sources: Vec<Arc<dyn PricingSource>>,
    store: Arc<dyn PriceStore>,
    status: Arc<dyn StatusSink>,
) -> IngestReport {
    let run_id = Uuid::new_v4();
    let started = Instant::now();
    info!(%run_id, providers = sources.len(), "ingestion cycle started");

    let mut tasks = JoinSet::new();
    for source in sources {
        let store = store.clone();
        tasks.spawn(ingest_provider(source, store));
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(join_err) => {
                // A panicked provider task is a bug, but it must not take
                // the cycle down with it.
                error!(error = %join_err, "provider ingestion task panicked");
            }
        }
    }
    outcomes.sort_by_key(|o| o.provider.as_str());

    if let Err(err) = status.write_timestamp(Utc::now()).await {
        warn!(error = %err, "failed to record refresh timestamp");
    }

    let report = IngestReport {
        run_id,
        total_upserted: outcomes.iter().map(|o| o.count).sum(),
        outcomes,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        %run_id,
        total = report.total_upserted,
        ok = report.all_succeeded(),
        duration_ms = report.duration_ms,
        "ingestion cycle finished"
    );
    report
}

async fn ingest_provider(
    source: Arc<dyn PricingSource>,
    store: Arc<dyn PriceStore>,
) -> ProviderOutcome {
    let provider = source.provider();
    let started = Instant::now();
    let mut records = Vec::new();
    let mut first_error: Option<String> = None;

    for pipeline in source.pipelines() {
        match source.fetch_pipeline(&pipeline).await {
            Ok(batch) => {
                info!(
                    provider = provider.as_str(),
                    %pipeline,
                    fetched = batch.len(),
                    "pipeline fetched"
                );
                records.extend(batch);
            }
            Err(err) => {
                warn!(
                    provider = provider.as_str(),
                    %pipeline,
                    error = %err,
                    "pipeline failed"
                );
                first_error.get_or_insert_with(|| err.to_string());
            }
        }
    }

    let records = dedup_records(records);
    let count = if records.is_empty() {
        0
    } else {
        match store.upsert(&records, provider).await {
            Ok(count) => count,
            Err(err) => {
                warn!(provider = provider.as_str(), error = %err, "upsert failed");
                first_error.get_or_insert_with(|| err.to_string());
                0
            }
        }
    };

    ProviderOutcome {
        provider,
        count,
        error: first_error,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
