//! Storage seam between the sync orchestrator and PostgreSQL.
//!
//! The orchestrator only ever talks to this trait, so sync semantics are
//! testable against an in-memory double without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{EntityKind, EntityRecord, NewRawRecord, RawStatus, SyncCheckpoint};

/// Result of one upsert: whether a row was created (vs. updated in place).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub created: bool,
}

/// Persistence operations required by the sync subsystem.
///
/// Upserts must be idempotent on the natural key: repeating a call with
/// identical data must never create a duplicate, and changed data on an
/// existing key updates the row rather than inserting another.
#[async_trait]
pub trait ProcurementStore: Send + Sync {
    /// Create-or-update by natural key, merging all fields and refreshing
    /// the modification timestamp.
    async fn upsert(&self, record: &EntityRecord) -> anyhow::Result<Upserted>;

    /// Archive a raw API response before transformation. Returns the row id.
    async fn insert_raw(&self, raw: &NewRawRecord) -> anyhow::Result<i64>;

    /// Flip an archived response out of `pending` once processed.
    async fn mark_raw_processed(
        &self,
        raw_id: i64,
        status: RawStatus,
        error: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn get_checkpoint(
        &self,
        entity: EntityKind,
        year: Option<i32>,
    ) -> anyhow::Result<Option<SyncCheckpoint>>;

    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> anyhow::Result<()>;

    /// Retention cleanup: delete archived responses older than the cutoff.
    /// Returns the number of rows removed.
    async fn delete_raw_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;
}
