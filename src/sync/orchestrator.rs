use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use log::{error, info, warn};
use serde_json::{json, Value};

use crate::client::{
    ClientError, ContractFilter, GoszakupClient, LotFilter, ParticipantFilter, TrdBuyFilter,
};
use crate::config::SyncSettings;
use crate::db::models::{EntityKind, NewRawRecord, RawStatus, SyncCheckpoint};
use crate::db::store::ProcurementStore;
use crate::sync::transform::transform;

/// Result of one entity sync run.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub entity: EntityKind,
    pub year: Option<i32>,
    /// Items returned by the API.
    pub fetched: usize,
    /// Items successfully transformed and upserted.
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    /// Per-item failures. The run still counts as a success.
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Aggregated result of a full `sync_all` pass.
///
/// A failed entity run (fetch or checkpoint error) lands in `failures` and
/// the pass keeps going; per-item errors stay inside their outcome.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<SyncOutcome>,
    pub failures: Vec<(EntityKind, Option<i32>, String)>,
}

impl SyncReport {
    pub fn fetched(&self) -> usize {
        self.outcomes.iter().map(|o| o.fetched).sum()
    }

    pub fn processed(&self) -> usize {
        self.outcomes.iter().map(|o| o.processed).sum()
    }
}

/// Drives incremental sync runs against the upstream API.
///
/// Generic over the store so sync semantics are tested against an in-memory
/// double. One instance is shared by all scheduled jobs.
pub struct SyncOrchestrator<S> {
    client: Arc<GoszakupClient>,
    store: Arc<S>,
    settings: SyncSettings,
}

impl<S: ProcurementStore> SyncOrchestrator<S> {
    pub fn new(client: Arc<GoszakupClient>, store: Arc<S>, settings: SyncSettings) -> Self {
        Self {
            client,
            store,
            settings,
        }
    }

    /// Years to partition yearly entities by. Defaults to the previous and
    /// current year when not configured.
    pub fn years(&self) -> Vec<i32> {
        if self.settings.years.is_empty() {
            let current = Utc::now().year();
            vec![current - 1, current]
        } else {
            self.settings.years.clone()
        }
    }

    /// Sync every entity: participants first, then the yearly entities per
    /// configured year. Individual entity failures are collected and the
    /// pass continues.
    pub async fn sync_all(&self, force_full: bool) -> SyncReport {
        let mut report = SyncReport::default();
        let years = self.years();

        info!("[SYNC] Starting full pass (years: {:?})", years);

        self.run_into(&mut report, EntityKind::Participant, None, force_full)
            .await;

        for year in years {
            for entity in [EntityKind::TrdBuy, EntityKind::Lot, EntityKind::Contract] {
                self.run_into(&mut report, entity, Some(year), force_full)
                    .await;
            }
        }

        info!(
            "[SYNC] Pass complete: {} fetched, {} processed, {} entity failure(s)",
            report.fetched(),
            report.processed(),
            report.failures.len()
        );
        report
    }

    /// Delta pass: current-year announcements and contracts only. Runs on a
    /// short interval between full passes to keep the hot window fresh.
    pub async fn sync_delta(&self) -> SyncReport {
        let year = Utc::now().year();
        let mut report = SyncReport::default();

        info!("[DELTA] Starting delta pass for {}", year);
        self.run_into(&mut report, EntityKind::TrdBuy, Some(year), false)
            .await;
        self.run_into(&mut report, EntityKind::Contract, Some(year), false)
            .await;
        report
    }

    async fn run_into(
        &self,
        report: &mut SyncReport,
        entity: EntityKind,
        year: Option<i32>,
        force_full: bool,
    ) {
        match self.sync_entity(entity, year, force_full).await {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(e) => {
                error!("[SYNC] {} ({:?}) failed: {:#}", entity, year, e);
                report.failures.push((entity, year, format!("{e:#}")));
            },
        }
    }

    /// Sync one (entity, year) partition.
    ///
    /// The incremental watermark is the checkpoint's `last_success_at`
    /// unless `force_full` drops it. On success the checkpoint advances to
    /// this run's start time, so records updated upstream mid-run are
    /// re-fetched by the next pass instead of being missed.
    pub async fn sync_entity(
        &self,
        entity: EntityKind,
        year: Option<i32>,
        force_full: bool,
    ) -> anyhow::Result<SyncOutcome> {
        let started_at = Utc::now();
        let year = if entity.is_yearly() { year } else { None };

        let previous = self.store.get_checkpoint(entity, year).await?;
        let watermark = if force_full {
            None
        } else {
            previous.as_ref().and_then(|c| c.last_success_at)
        };

        match watermark {
            Some(ts) => info!("[SYNC] {} ({:?}): incremental since {}", entity, year, ts),
            None => info!("[SYNC] {} ({:?}): full fetch", entity, year),
        }

        let (items, query_params) = match self.fetch(entity, year, watermark).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let checkpoint = SyncCheckpoint::failure(
                    entity,
                    year,
                    previous.and_then(|c| c.last_success_at),
                    &e.to_string(),
                );
                self.store.save_checkpoint(&checkpoint).await?;
                return Err(anyhow::Error::new(e)
                    .context(format!("fetch failed for {entity} ({year:?})")));
            },
        };

        let fetched = items.len();
        let raw = NewRawRecord::new(
            entity.endpoint(),
            query_params,
            json!({ "items": items, "total": fetched }),
            year,
            started_at,
        );
        let raw_id = self.store.insert_raw(&raw).await?;

        let batch_size = match entity {
            EntityKind::Participant => self.settings.participant_batch_size,
            _ => self.settings.batch_size,
        };

        let mut processed = 0usize;
        let mut created = 0usize;
        let mut updated = 0usize;
        let mut errors: Vec<String> = Vec::new();

        for batch in items.chunks(batch_size.max(1)) {
            for item in batch {
                match self.process_item(entity, item, year, started_at).await {
                    Ok(was_created) => {
                        processed += 1;
                        if was_created {
                            created += 1;
                        } else {
                            updated += 1;
                        }
                    },
                    Err(e) => {
                        let id = item.get("id").cloned().unwrap_or(Value::Null);
                        let msg = format!("{} {}: {:#}", entity, id, e);
                        warn!("[SYNC] Skipping item: {}", msg);
                        errors.push(msg);
                    },
                }
            }
        }

        let raw_status = if fetched == 0 {
            RawStatus::Skipped
        } else if errors.is_empty() {
            RawStatus::Success
        } else {
            RawStatus::Error
        };
        let raw_error = (!errors.is_empty()).then(|| format!("{} item(s) failed", errors.len()));
        self.store
            .mark_raw_processed(raw_id, raw_status, raw_error.as_deref())
            .await?;

        // Per-item failures do not block the watermark: the raw archive
        // keeps the bad payloads for replay.
        self.store
            .save_checkpoint(&SyncCheckpoint::success(entity, year, started_at))
            .await?;

        let finished_at = Utc::now();
        info!(
            "[SYNC] {} ({:?}): {} fetched, {} created, {} updated, {} error(s) in {}s",
            entity,
            year,
            fetched,
            created,
            updated,
            errors.len(),
            (finished_at - started_at).num_seconds()
        );

        Ok(SyncOutcome {
            entity,
            year,
            fetched,
            processed,
            created,
            updated,
            errors,
            started_at,
            finished_at,
        })
    }

    async fn process_item(
        &self,
        entity: EntityKind,
        item: &Value,
        year: Option<i32>,
        synced_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let record = transform(entity, item, year, synced_at)?;
        let upserted = self.store.upsert(&record).await?;
        Ok(upserted.created)
    }

    async fn fetch(
        &self,
        entity: EntityKind,
        year: Option<i32>,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<(Vec<Value>, Value), ClientError> {
        match entity {
            EntityKind::TrdBuy => {
                let filter = TrdBuyFilter {
                    year,
                    updated_after,
                    ..Default::default()
                };
                let items = self.client.trd_buy(&filter).await?;
                Ok((items, query_json(&filter.to_query())))
            },
            EntityKind::Lot => {
                let filter = LotFilter {
                    year,
                    updated_after,
                    ..Default::default()
                };
                let items = self.client.lots(&filter).await?;
                Ok((items, query_json(&filter.to_query())))
            },
            EntityKind::Contract => {
                let filter = ContractFilter {
                    year,
                    updated_after,
                    ..Default::default()
                };
                let items = self.client.contracts(&filter).await?;
                Ok((items, query_json(&filter.to_query())))
            },
            EntityKind::Participant => {
                let filter = ParticipantFilter {
                    updated_after,
                    ..Default::default()
                };
                let items = self.client.participants(&filter).await?;
                Ok((items, query_json(&filter.to_query())))
            },
        }
    }
}

fn query_json(query: &[(String, String)]) -> Value {
    Value::Object(
        query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

// ==================== TESTS ====================
