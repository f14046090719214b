//! Full synchronization pass over every entity and configured year.

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use crate::cron::{run_with_policy, RetryPolicy};
use crate::db::ProcurementStore;
use crate::sync::SyncOrchestrator;

const POLICY: RetryPolicy = RetryPolicy {
    max_retries: 2,
    backoff: Duration::from_secs(60),
    time_limit: Duration::from_secs(3600),
};

pub async fn run<S: ProcurementStore>(orchestrator: &SyncOrchestrator<S>) -> Result<()> {
    info!("Starting full_sync job...");
    let start = std::time::Instant::now();

    let report = run_with_policy("full_sync", POLICY, || async {
        let report = orchestrator.sync_all(false).await;
        // A pass where every single entity failed is worth a retry; partial
        // failures are already checkpointed per entity.
        if !report.outcomes.is_empty() || report.failures.is_empty() {
            Ok(report)
        } else {
            Err(anyhow::anyhow!(
                "all {} entity runs failed",
                report.failures.len()
            ))
        }
    })
    .await?;

    if !report.failures.is_empty() {
        warn!(
            "full_sync completed with {} entity failure(s)",
            report.failures.len()
        );
    }
    info!(
        "Completed full_sync job in {:?} ({} fetched, {} processed)",
        start.elapsed(),
        report.fetched(),
        report.processed()
    );
    Ok(())
}
