use std::sync::Arc;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use scanzakup::{CronScheduler, GoszakupClient, PostgresClient, Settings, SyncOrchestrator};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    // Load configuration
    let settings =
        Settings::new().context("Failed to load config.yaml. Please ensure it exists and is valid")?;

    let cancellation_token = CancellationToken::new();

    let postgres = PostgresClient::new(settings.postgres.clone())
        .await
        .context("Failed to initialize database connection")?;
    postgres.migrate().await?;
    let store = Arc::new(postgres);

    // One client per process: the rate limiter, circuit breaker and response
    // cache must be shared by every sync run.
    let client = Arc::new(GoszakupClient::new(settings.goszakup.clone()));

    let health = client.health_check().await;
    if health.accessible {
        info!(
            "Goszakup API reachable ({} announcements upstream)",
            health.total_records
        );
    } else {
        error!(
            "Goszakup API not reachable at startup: {}",
            health.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    let orchestrator = Arc::new(SyncOrchestrator::new(
        client,
        store.clone(),
        settings.sync.clone(),
    ));

    // Create and spawn the cron scheduler for background jobs
    // (full sync, delta sync, raw archive cleanup)
    let cron_scheduler = CronScheduler::new(orchestrator, store, settings.sync.clone());

    let cron_token = cancellation_token.child_token();
    let cron_handle = tokio::spawn(async move {
        if let Err(e) = cron_scheduler.run(cron_token).await {
            error!("Cron scheduler failed: {:#}", e);
        }
    });

    info!("Cron scheduler started - sync jobs will run periodically");

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    // Set up graceful shutdown signal handler
    info!("Sync service running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    // Cancel all running tasks
    info!("Finishing all tasks...");

    cancellation_token.cancel();

    // Wait for the cron scheduler to stop
    info!("Waiting for cron scheduler to stop...");
    let _ = cron_handle.await;

    info!("Sync service stopped");
    Ok(())
}
