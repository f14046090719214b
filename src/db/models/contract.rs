use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Signed procurement contract.
///
/// Natural Key: `goszakup_id`
/// `lot_id` references the awarded lot by explicit foreign key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub goszakup_id: i64,
    pub contract_number: Option<String>,
    pub lot_id: Option<i64>,

    pub description_ru: Option<String>,
    pub description_kz: Option<String>,

    pub sum: Option<BigDecimal>,
    pub supplier_sum: Option<BigDecimal>,

    pub customer_bin: Option<String>,
    pub customer_name_ru: Option<String>,
    pub customer_name_kz: Option<String>,
    pub supplier_bin: Option<String>,
    pub supplier_name_ru: Option<String>,
    pub supplier_name_kz: Option<String>,

    pub sign_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    pub status_ru: Option<String>,
    pub status_kz: Option<String>,

    pub year: i32,

    pub raw_data: Value,
    pub last_synced_at: DateTime<Utc>,
}
