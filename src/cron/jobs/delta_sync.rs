//! Frequent delta pass over the current year's hot entities.

use std::time::Duration;

use anyhow::Result;
use log::info;

use crate::cron::{run_with_policy, RetryPolicy};
use crate::db::ProcurementStore;
use crate::sync::SyncOrchestrator;

const POLICY: RetryPolicy = RetryPolicy {
    max_retries: 1,
    backoff: Duration::from_secs(30),
    time_limit: Duration::from_secs(600),
};

pub async fn run<S: ProcurementStore>(orchestrator: &SyncOrchestrator<S>) -> Result<()> {
    info!("Starting delta_sync job...");
    let start = std::time::Instant::now();

    let report = run_with_policy("delta_sync", POLICY, || async {
        let report = orchestrator.sync_delta().await;
        if report.outcomes.is_empty() && !report.failures.is_empty() {
            Err(anyhow::anyhow!("delta pass failed for every entity"))
        } else {
            Ok(report)
        }
    })
    .await?;

    info!(
        "Completed delta_sync job in {:?} ({} fetched)",
        start.elapsed(),
        report.fetched()
    );
    Ok(())
}
