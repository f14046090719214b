use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Procurement lot.
///
/// Natural Key: `goszakup_id`
/// `trd_buy_id` is an explicit foreign key to the parent announcement; any
/// join is performed by the query layer, never by lazy traversal here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub goszakup_id: i64,
    pub lot_number: Option<String>,
    pub trd_buy_id: Option<i64>,

    pub description_ru: Option<String>,
    pub description_kz: Option<String>,

    // KTRU product classification
    pub ktru_code: Option<String>,
    pub ktru_name_ru: Option<String>,
    pub ktru_name_kz: Option<String>,

    pub quantity: Option<BigDecimal>,
    pub price_per_unit: Option<BigDecimal>,
    pub total_sum: Option<BigDecimal>,

    pub status_ru: Option<String>,
    pub status_kz: Option<String>,

    pub delivery_place_ru: Option<String>,
    pub delivery_place_kz: Option<String>,
    pub delivery_term: Option<String>,

    pub raw_data: Value,
    pub last_synced_at: DateTime<Utc>,
}
