mod config;

pub use config::{GoszakupSettings, PostgresSettings, Settings, SyncSettings};
