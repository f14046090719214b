//! In-memory [`ProcurementStore`] used by sync orchestrator tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{
    Contract, EntityKind, EntityRecord, Lot, NewRawRecord, Participant, RawStatus, SyncCheckpoint,
    TrdBuy,
};
use super::store::{ProcurementStore, Upserted};

#[derive(Debug, Clone)]
pub struct StoredRaw {
    pub record: NewRawRecord,
    pub status: RawStatus,
    pub error: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    trd_buys: HashMap<i64, TrdBuy>,
    lots: HashMap<i64, Lot>,
    contracts: HashMap<i64, Contract>,
    participants: HashMap<String, Participant>,
    raws: Vec<StoredRaw>,
    checkpoints: HashMap<(EntityKind, Option<i32>), SyncCheckpoint>,
}

/// HashMap-backed store double with the same upsert/checkpoint semantics as
/// the PostgreSQL implementation.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trd_buy_count(&self) -> usize {
        self.state.lock().unwrap().trd_buys.len()
    }

    pub fn participant_count(&self) -> usize {
        self.state.lock().unwrap().participants.len()
    }

    pub fn get_trd_buy(&self, goszakup_id: i64) -> Option<TrdBuy> {
        self.state.lock().unwrap().trd_buys.get(&goszakup_id).cloned()
    }

    pub fn raw_records(&self) -> Vec<StoredRaw> {
        self.state.lock().unwrap().raws.clone()
    }

    pub fn checkpoint(&self, entity: EntityKind, year: Option<i32>) -> Option<SyncCheckpoint> {
        self.state
            .lock()
            .unwrap()
            .checkpoints
            .get(&(entity, year))
            .cloned()
    }

    pub fn seed_checkpoint(&self, checkpoint: SyncCheckpoint) {
        let mut state = self.state.lock().unwrap();
        state
            .checkpoints
            .insert((checkpoint.entity, checkpoint.year), checkpoint);
    }
}

#[async_trait]
impl ProcurementStore for MemoryStore {
    async fn upsert(&self, record: &EntityRecord) -> anyhow::Result<Upserted> {
        let mut state = self.state.lock().unwrap();
        let created = match record {
            EntityRecord::TrdBuy(t) => state.trd_buys.insert(t.goszakup_id, t.clone()).is_none(),
            EntityRecord::Lot(l) => state.lots.insert(l.goszakup_id, l.clone()).is_none(),
            EntityRecord::Contract(c) => state.contracts.insert(c.goszakup_id, c.clone()).is_none(),
            EntityRecord::Participant(p) => {
                let key = p
                    .identifier()
                    .ok_or_else(|| anyhow::anyhow!("participant without BIN/IIN"))?
                    .to_string();
                state.participants.insert(key, p.clone()).is_none()
            },
        };
        Ok(Upserted { created })
    }

    async fn insert_raw(&self, raw: &NewRawRecord) -> anyhow::Result<i64> {
        let mut state = self.state.lock().unwrap();
        state.raws.push(StoredRaw {
            record: raw.clone(),
            status: RawStatus::Pending,
            error: None,
        });
        Ok(state.raws.len() as i64 - 1)
    }

    async fn mark_raw_processed(
        &self,
        raw_id: i64,
        status: RawStatus,
        error: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        let raw = state
            .raws
            .get_mut(raw_id as usize)
            .ok_or_else(|| anyhow::anyhow!("unknown raw record {raw_id}"))?;
        raw.status = status;
        raw.error = error.map(str::to_string);
        Ok(())
    }

    async fn get_checkpoint(
        &self,
        entity: EntityKind,
        year: Option<i32>,
    ) -> anyhow::Result<Option<SyncCheckpoint>> {
        Ok(self.checkpoint(entity, year))
    }

    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> anyhow::Result<()> {
        self.seed_checkpoint(checkpoint.clone());
        Ok(())
    }

    async fn delete_raw_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.raws.len();
        state.raws.retain(|r| r.record.requested_at >= cutoff);
        Ok((before - state.raws.len()) as u64)
    }
}
