use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityKind;

/// Outcome status of the most recent sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => SyncStatus::Success,
            _ => SyncStatus::Failed,
        }
    }
}

/// Sync progress checkpoint, one per (entity, year).
///
/// `last_success_at` is the incremental watermark: it only advances when a
/// run succeeds, so a failed run retries the same window on the next
/// trigger. Status and error are overwritten after every run, success or
/// failure. Owned exclusively by the sync orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub entity: EntityKind,
    /// None for year-agnostic entities (participants).
    pub year: Option<i32>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_status: SyncStatus,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SyncCheckpoint {
    pub fn success(entity: EntityKind, year: Option<i32>, at: DateTime<Utc>) -> Self {
        Self {
            entity,
            year,
            last_success_at: Some(at),
            last_status: SyncStatus::Success,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// A failure keeps the previous watermark so the window is re-synced.
    pub fn failure(
        entity: EntityKind,
        year: Option<i32>,
        previous_success: Option<DateTime<Utc>>,
        error: &str,
    ) -> Self {
        Self {
            entity,
            year,
            last_success_at: previous_success,
            last_status: SyncStatus::Failed,
            last_error: Some(error.to_string()),
            updated_at: Utc::now(),
        }
    }
}
