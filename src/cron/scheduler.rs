//! Cron scheduler for periodic sync jobs.
//!
//! Runs jobs like:
//! - Full synchronization of every entity and configured year
//! - Frequent delta sync of the current year's announcements and contracts
//! - Daily retention cleanup of the raw response archive

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::config::SyncSettings;
use crate::db::ProcurementStore;
use crate::sync::SyncOrchestrator;

use super::jobs;

/// Cron scheduler that manages the periodic sync jobs.
pub struct CronScheduler<S> {
    orchestrator: Arc<SyncOrchestrator<S>>,
    store: Arc<S>,
    settings: SyncSettings,
}

impl<S: ProcurementStore + 'static> CronScheduler<S> {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator<S>>,
        store: Arc<S>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            orchestrator,
            store,
            settings,
        }
    }

    /// Starts the cron scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        // Register all jobs
        self.register_full_sync_job(&scheduler).await?;
        self.register_delta_sync_job(&scheduler).await?;
        self.register_cleanup_raw_job(&scheduler).await?;

        // Start the scheduler
        scheduler.start().await?;
        info!("Cron scheduler started with {} jobs", 3);

        // Wait for cancellation
        cancellation_token.cancelled().await;
        info!("Cron scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_full_sync_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let orchestrator = self.orchestrator.clone();
        let interval = self.settings.full_sync_interval_secs;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let orchestrator = orchestrator.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::full_sync::run(orchestrator.as_ref()).await {
                        error!("Failed to run full sync: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered full_sync job (every {}s)", interval);
        Ok(())
    }

    async fn register_delta_sync_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let orchestrator = self.orchestrator.clone();
        let interval = self.settings.delta_sync_interval_secs;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let orchestrator = orchestrator.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::delta_sync::run(orchestrator.as_ref()).await {
                        error!("Failed to run delta sync: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered delta_sync job (every {}s)", interval);
        Ok(())
    }

    async fn register_cleanup_raw_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let store = self.store.clone();
        let interval = self.settings.cleanup_interval_secs;
        let retention_days = self.settings.raw_retention_days;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let store = store.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::cleanup_raw::run(store.as_ref(), retention_days).await {
                        error!("Failed to clean up raw archive: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!(
            "Registered cleanup_raw job (every {}s, retention {} days)",
            interval, retention_days
        );
        Ok(())
    }
}
