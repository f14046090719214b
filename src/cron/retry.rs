//! Retry and time-limit policy for scheduled jobs.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use log::warn;

/// Per-job execution policy.
///
/// The time limit bounds the whole run including retries and backoff; a job
/// that blows through it is abandoned so it cannot eat the next slot.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Sleep between attempts, multiplied by the attempt number.
    pub backoff: Duration,
    pub time_limit: Duration,
}

/// Run `task` under `policy`, retrying failed attempts with linear backoff.
pub async fn run_with_policy<T, F, Fut>(name: &str, policy: RetryPolicy, mut task: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = async {
        let mut attempt: u32 = 0;
        loop {
            match task().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < policy.max_retries => {
                    attempt += 1;
                    let delay = policy.backoff * attempt;
                    warn!(
                        "Job {} failed (attempt {}/{}), retrying in {:?}: {:#}",
                        name, attempt, policy.max_retries, delay, e
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) => return Err(e.context(format!("job {name} exhausted retries"))),
            }
        }
    };

    match tokio::time::timeout(policy.time_limit, attempts).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "job {} exceeded time limit of {:?}",
            name,
            policy.time_limit
        )),
    }
}
