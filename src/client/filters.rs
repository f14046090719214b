//! Typed query filters for the Goszakup REST endpoints.
//!
//! One struct per entity with named optional fields, replacing the upstream
//! API's free-form query-string conventions. `updated_date` is the canonical
//! incremental watermark parameter for every entity.

use chrono::{DateTime, Utc};

fn push_watermark(query: &mut Vec<(String, String)>, updated_after: Option<DateTime<Utc>>) {
    if let Some(ts) = updated_after {
        query.push((
            "updated_date".to_string(),
            ts.format("%Y-%m-%dT%H:%M:%S").to_string(),
        ));
    }
}

/// Filters for procurement announcements (`trd_buy`).
#[derive(Debug, Clone, Default)]
pub struct TrdBuyFilter {
    pub year: Option<i32>,
    pub customer_bin: Option<String>,
    pub updated_after: Option<DateTime<Utc>>,
}

impl TrdBuyFilter {
    pub fn for_year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(year) = self.year {
            query.push(("year".to_string(), year.to_string()));
        }
        if let Some(bin) = &self.customer_bin {
            query.push(("customer_bin".to_string(), bin.clone()));
        }
        push_watermark(&mut query, self.updated_after);
        query
    }
}

/// Filters for lots.
#[derive(Debug, Clone, Default)]
pub struct LotFilter {
    pub year: Option<i32>,
    /// Restrict to lots of one parent announcement.
    pub trd_buy_id: Option<i64>,
    pub updated_after: Option<DateTime<Utc>>,
}

impl LotFilter {
    pub fn for_year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(year) = self.year {
            query.push(("year".to_string(), year.to_string()));
        }
        if let Some(id) = self.trd_buy_id {
            query.push(("trd_buy_id".to_string(), id.to_string()));
        }
        push_watermark(&mut query, self.updated_after);
        query
    }
}

/// Filters for contracts.
#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    pub year: Option<i32>,
    pub supplier_bin: Option<String>,
    pub updated_after: Option<DateTime<Utc>>,
}

impl ContractFilter {
    pub fn for_year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(year) = self.year {
            query.push(("year".to_string(), year.to_string()));
        }
        if let Some(bin) = &self.supplier_bin {
            query.push(("supplier_bin".to_string(), bin.clone()));
        }
        push_watermark(&mut query, self.updated_after);
        query
    }
}

/// Filters for participants. Participants are not year-partitioned.
#[derive(Debug, Clone, Default)]
pub struct ParticipantFilter {
    pub bin: Option<String>,
    pub iin: Option<String>,
    pub updated_after: Option<DateTime<Utc>>,
}

impl ParticipantFilter {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(bin) = &self.bin {
            query.push(("bin".to_string(), bin.clone()));
        }
        if let Some(iin) = &self.iin {
            query.push(("iin".to_string(), iin.clone()));
        }
        push_watermark(&mut query, self.updated_after);
        query
    }
}
