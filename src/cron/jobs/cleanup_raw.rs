//! Daily retention cleanup of the raw response archive.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::cron::{run_with_policy, RetryPolicy};
use crate::db::ProcurementStore;

const POLICY: RetryPolicy = RetryPolicy {
    max_retries: 1,
    backoff: Duration::from_secs(60),
    time_limit: Duration::from_secs(900),
};

pub async fn run<S: ProcurementStore>(store: &S, retention_days: i64) -> Result<()> {
    info!("Starting cleanup_raw job...");
    let start = std::time::Instant::now();

    let cutoff = Utc::now() - chrono::Duration::days(retention_days);
    let deleted = run_with_policy("cleanup_raw", POLICY, || async {
        store.delete_raw_older_than(cutoff).await
    })
    .await?;

    info!(
        "Completed cleanup_raw job in {:?} ({} row(s) older than {} removed)",
        start.elapsed(),
        deleted,
        cutoff.format("%Y-%m-%d")
    );
    Ok(())
}
