use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Procurement announcement (upstream `trd_buy`).
///
/// Natural Key: `goszakup_id`
/// Query Pattern: "announcements for customer X in year Y"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrdBuy {
    pub goszakup_id: i64,
    pub number: Option<String>,

    // Bilingual subject
    pub name_ru: Option<String>,
    pub name_kz: Option<String>,

    // Customer (denormalized, participants hold the canonical record)
    pub customer_bin: Option<String>,
    pub customer_name_ru: Option<String>,
    pub customer_name_kz: Option<String>,

    pub lots_count: i64,

    // Lifecycle dates
    pub application_start_date: Option<DateTime<Utc>>,
    pub application_end_date: Option<DateTime<Utc>>,
    pub publish_date: Option<DateTime<Utc>>,

    pub purchase_type_ru: Option<String>,
    pub purchase_type_kz: Option<String>,
    pub status_ru: Option<String>,
    pub status_kz: Option<String>,

    pub total_sum: Option<BigDecimal>,

    /// Year partition assigned by the sync run.
    pub year: i32,

    /// Original API payload for this record.
    pub raw_data: Value,
    pub last_synced_at: DateTime<Utc>,
}
