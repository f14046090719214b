mod checkpoint;
mod contract;
mod lot;
mod participant;
mod raw_record;
mod trd_buy;

use serde::{Deserialize, Serialize};

pub use checkpoint::{SyncCheckpoint, SyncStatus};
pub use contract::Contract;
pub use lot::Lot;
pub use participant::Participant;
pub use raw_record::{content_hash, NewRawRecord, RawStatus};
pub use trd_buy::TrdBuy;

/// The four synchronized entity types.
///
/// `sync_all` runs them in declaration order: participants first so the
/// denormalized BIN references on the other entities dangle as little as
/// possible in reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Participant,
    TrdBuy,
    Lot,
    Contract,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Participant,
        EntityKind::TrdBuy,
        EntityKind::Lot,
        EntityKind::Contract,
    ];

    /// Upstream REST endpoint path segment.
    pub fn endpoint(&self) -> &'static str {
        match self {
            EntityKind::Participant => "participant",
            EntityKind::TrdBuy => "trd_buy",
            EntityKind::Lot => "lot",
            EntityKind::Contract => "contract",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.endpoint()
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "participant" => Some(EntityKind::Participant),
            "trd_buy" => Some(EntityKind::TrdBuy),
            "lot" => Some(EntityKind::Lot),
            "contract" => Some(EntityKind::Contract),
            _ => None,
        }
    }

    /// Participants are not partitioned by year.
    pub fn is_yearly(&self) -> bool {
        !matches!(self, EntityKind::Participant)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transformed record ready for upsert, tagged by entity type.
#[derive(Debug, Clone)]
pub enum EntityRecord {
    TrdBuy(TrdBuy),
    Lot(Lot),
    Contract(Contract),
    Participant(Participant),
}

impl EntityRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRecord::TrdBuy(_) => EntityKind::TrdBuy,
            EntityRecord::Lot(_) => EntityKind::Lot,
            EntityRecord::Contract(_) => EntityKind::Contract,
            EntityRecord::Participant(_) => EntityKind::Participant,
        }
    }

    /// Natural key rendered for logs and error messages.
    pub fn natural_key(&self) -> String {
        match self {
            EntityRecord::TrdBuy(t) => t.goszakup_id.to_string(),
            EntityRecord::Lot(l) => l.goszakup_id.to_string(),
            EntityRecord::Contract(c) => c.goszakup_id.to_string(),
            EntityRecord::Participant(p) => p.identifier().unwrap_or("<missing>").to_string(),
        }
    }
}
