use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Procurement participant (customer or supplier organization/individual).
///
/// Natural Key: BIN for organizations, IIN for individuals. At least one of
/// the two must be present for a record to be upserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub bin: Option<String>,
    pub iin: Option<String>,

    pub name_ru: Option<String>,
    pub name_kz: Option<String>,
    pub name_en: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_ru: Option<String>,
    pub address_kz: Option<String>,
    pub region_code: Option<String>,

    pub is_active: bool,
    pub participant_type: String,
    pub registration_date: Option<DateTime<Utc>>,

    // OKED economic activity classification
    pub oked_code: Option<String>,

    pub raw_data: Value,
    pub last_synced_at: DateTime<Utc>,
}

impl Participant {
    /// BIN wins over IIN when both are present.
    pub fn identifier(&self) -> Option<&str> {
        self.bin.as_deref().or(self.iin.as_deref())
    }
}
