pub mod client;
pub mod config;
pub mod cron;
pub mod db;
pub mod sync;

pub use client::GoszakupClient;
pub use config::Settings;
pub use cron::{CronScheduler, RetryPolicy};
pub use db::{PostgresClient, ProcurementStore};
pub use sync::SyncOrchestrator;
