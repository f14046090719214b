//! API payload -> entity model transformation.
//!
//! Transformers are total over malformed optional fields: an unparseable
//! date or sum becomes `None`, only a missing natural key rejects a record.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::db::models::{Contract, EntityKind, EntityRecord, Lot, Participant, TrdBuy};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("{entity} record is missing its natural key ({field})")]
    MissingKey {
        entity: EntityKind,
        field: &'static str,
    },
}

/// Transform one raw API item into an upsertable record.
///
/// `year` is the partition the item was fetched under; year-agnostic
/// entities ignore it. `synced_at` stamps the record's modification time.
pub fn transform(
    kind: EntityKind,
    item: &Value,
    year: Option<i32>,
    synced_at: DateTime<Utc>,
) -> Result<EntityRecord, TransformError> {
    match kind {
        EntityKind::TrdBuy => transform_trd_buy(item, year.unwrap_or(0), synced_at),
        EntityKind::Lot => transform_lot(item, synced_at),
        EntityKind::Contract => transform_contract(item, year.unwrap_or(0), synced_at),
        EntityKind::Participant => transform_participant(item, synced_at),
    }
}

fn transform_trd_buy(
    item: &Value,
    year: i32,
    synced_at: DateTime<Utc>,
) -> Result<EntityRecord, TransformError> {
    let goszakup_id = get_i64(item, "id").ok_or(TransformError::MissingKey {
        entity: EntityKind::TrdBuy,
        field: "id",
    })?;

    Ok(EntityRecord::TrdBuy(TrdBuy {
        goszakup_id,
        number: get_str(item, "number"),
        name_ru: get_str(item, "name_ru"),
        name_kz: get_str(item, "name_kz"),
        customer_bin: get_str(item, "customer_bin"),
        customer_name_ru: get_str(item, "customer_name_ru"),
        customer_name_kz: get_str(item, "customer_name_kz"),
        lots_count: get_i64(item, "lots_count").unwrap_or(0),
        application_start_date: parse_datetime(item.get("application_start_date")),
        application_end_date: parse_datetime(item.get("application_end_date")),
        publish_date: parse_datetime(item.get("publish_date")),
        purchase_type_ru: get_str(item, "purchase_type_ru"),
        purchase_type_kz: get_str(item, "purchase_type_kz"),
        status_ru: get_str(item, "status_ru"),
        status_kz: get_str(item, "status_kz"),
        total_sum: parse_decimal(item.get("total_sum")),
        year,
        raw_data: item.clone(),
        last_synced_at: synced_at,
    }))
}

fn transform_lot(item: &Value, synced_at: DateTime<Utc>) -> Result<EntityRecord, TransformError> {
    let goszakup_id = get_i64(item, "id").ok_or(TransformError::MissingKey {
        entity: EntityKind::Lot,
        field: "id",
    })?;

    Ok(EntityRecord::Lot(Lot {
        goszakup_id,
        lot_number: get_str(item, "lot_number"),
        trd_buy_id: get_i64(item, "trd_buy_id"),
        description_ru: get_str(item, "description_ru"),
        description_kz: get_str(item, "description_kz"),
        ktru_code: get_str(item, "ktru_code"),
        ktru_name_ru: get_str(item, "ktru_name_ru"),
        ktru_name_kz: get_str(item, "ktru_name_kz"),
        quantity: parse_decimal(item.get("quantity")),
        price_per_unit: parse_decimal(item.get("price_per_unit")),
        total_sum: parse_decimal(item.get("total_sum")),
        status_ru: get_str(item, "status_ru"),
        status_kz: get_str(item, "status_kz"),
        delivery_place_ru: get_str(item, "delivery_place_ru"),
        delivery_place_kz: get_str(item, "delivery_place_kz"),
        delivery_term: get_str(item, "delivery_term"),
        raw_data: item.clone(),
        last_synced_at: synced_at,
    }))
}

fn transform_contract(
    item: &Value,
    year: i32,
    synced_at: DateTime<Utc>,
) -> Result<EntityRecord, TransformError> {
    let goszakup_id = get_i64(item, "id").ok_or(TransformError::MissingKey {
        entity: EntityKind::Contract,
        field: "id",
    })?;

    Ok(EntityRecord::Contract(Contract {
        goszakup_id,
        contract_number: get_str(item, "contract_number"),
        lot_id: get_i64(item, "lot_id"),
        description_ru: get_str(item, "description_ru"),
        description_kz: get_str(item, "description_kz"),
        sum: parse_decimal(item.get("sum")),
        supplier_sum: parse_decimal(item.get("supplier_sum")),
        customer_bin: get_str(item, "customer_bin"),
        customer_name_ru: get_str(item, "customer_name_ru"),
        customer_name_kz: get_str(item, "customer_name_kz"),
        supplier_bin: get_str(item, "supplier_bin"),
        supplier_name_ru: get_str(item, "supplier_name_ru"),
        supplier_name_kz: get_str(item, "supplier_name_kz"),
        sign_date: parse_datetime(item.get("sign_date")),
        start_date: parse_datetime(item.get("start_date")),
        end_date: parse_datetime(item.get("end_date")),
        status_ru: get_str(item, "status_ru"),
        status_kz: get_str(item, "status_kz"),
        year,
        raw_data: item.clone(),
        last_synced_at: synced_at,
    }))
}

fn transform_participant(
    item: &Value,
    synced_at: DateTime<Utc>,
) -> Result<EntityRecord, TransformError> {
    let participant = Participant {
        bin: get_str(item, "bin"),
        iin: get_str(item, "iin"),
        name_ru: get_str(item, "name_ru"),
        name_kz: get_str(item, "name_kz"),
        name_en: get_str(item, "name_en"),
        email: get_str(item, "email"),
        phone: get_str(item, "phone"),
        address_ru: get_str(item, "address_ru"),
        address_kz: get_str(item, "address_kz"),
        region_code: get_str(item, "region_code"),
        is_active: item
            .get("is_active")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        participant_type: get_str(item, "participant_type").unwrap_or_else(|| "unknown".into()),
        registration_date: parse_datetime(item.get("registration_date")),
        oked_code: get_str(item, "oked_code"),
        raw_data: item.clone(),
        last_synced_at: synced_at,
    };

    if participant.identifier().is_none() {
        return Err(TransformError::MissingKey {
            entity: EntityKind::Participant,
            field: "bin/iin",
        });
    }

    Ok(EntityRecord::Participant(participant))
}

// ==================== FIELD PARSERS ====================

fn get_str(item: &Value, field: &str) -> Option<String> {
    match item.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn get_i64(item: &Value, field: &str) -> Option<i64> {
    match item.get(field) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// The upstream API renders timestamps in several shapes depending on the
/// endpoint. Timestamps carry no offset and are treated as UTC.
pub fn parse_datetime(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let s = value?.as_str()?.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    // Date-only fields come through as midnight
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
}

/// Monetary sums arrive as JSON numbers or as strings, occasionally padded.
pub fn parse_decimal(value: Option<&Value>) -> Option<BigDecimal> {
    match value? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse().ok()
            }
        },
        _ => None,
    }
}

// ==================== TESTS ====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::str::FromStr;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn trd_buy_full_payload() {
        let item = json!({
            "id": 12345,
            "number": "A-001",
            "name_ru": "Закупка услуг",
            "customer_bin": "123456789012",
            "lots_count": 3,
            "publish_date": "2024-03-15T10:30:00",
            "total_sum": "1500000.50",
            "status_ru": "Опубликовано"
        });

        let record = transform(EntityKind::TrdBuy, &item, Some(2024), now()).unwrap();
        let EntityRecord::TrdBuy(t) = record else {
            panic!("wrong variant");
        };

        assert_eq!(t.goszakup_id, 12345);
        assert_eq!(t.number.as_deref(), Some("A-001"));
        assert_eq!(t.lots_count, 3);
        assert_eq!(t.year, 2024);
        assert_eq!(
            t.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap())
        );
        assert_eq!(t.total_sum, Some(BigDecimal::from_str("1500000.50").unwrap()));
        assert_eq!(t.raw_data, item);
    }

    #[test]
    fn trd_buy_missing_id_is_rejected() {
        let item = json!({"number": "A-002"});
        let err = transform(EntityKind::TrdBuy, &item, Some(2024), now()).unwrap_err();
        assert!(err.to_string().contains("natural key"));
    }

    #[test]
    fn lot_numeric_fields_tolerate_garbage() {
        let item = json!({
            "id": "777",
            "quantity": "not-a-number",
            "price_per_unit": 120.5,
            "total_sum": null
        });

        let EntityRecord::Lot(l) = transform(EntityKind::Lot, &item, None, now()).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(l.goszakup_id, 777);
        assert_eq!(l.quantity, None);
        assert_eq!(l.price_per_unit, Some(BigDecimal::from_str("120.5").unwrap()));
        assert_eq!(l.total_sum, None);
    }

    #[test]
    fn contract_dates_parse_all_formats() {
        let item = json!({
            "id": 1,
            "sign_date": "2024-01-05T08:00:00.123",
            "start_date": "2024-01-06 09:15:00",
            "end_date": "2024-12-31"
        });

        let EntityRecord::Contract(c) =
            transform(EntityKind::Contract, &item, Some(2024), now()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert!(c.sign_date.is_some());
        assert_eq!(
            c.start_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 6, 9, 15, 0).unwrap())
        );
        assert_eq!(
            c.end_date,
            Some(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn participant_defaults_and_identifier() {
        let item = json!({"iin": "900101300123"});
        let EntityRecord::Participant(p) =
            transform(EntityKind::Participant, &item, None, now()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert!(p.is_active);
        assert_eq!(p.participant_type, "unknown");
        assert_eq!(p.identifier(), Some("900101300123"));

        let both = json!({"bin": "111", "iin": "222"});
        let EntityRecord::Participant(p) =
            transform(EntityKind::Participant, &both, None, now()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(p.identifier(), Some("111"));
    }

    #[test]
    fn participant_without_keys_is_rejected() {
        let item = json!({"name_ru": "ТОО Ромашка"});
        assert!(transform(EntityKind::Participant, &item, None, now()).is_err());
    }

    #[test]
    fn unparseable_datetime_is_none() {
        assert_eq!(parse_datetime(Some(&json!("15/03/2024"))), None);
        assert_eq!(parse_datetime(Some(&json!(""))), None);
        assert_eq!(parse_datetime(Some(&json!(42))), None);
        assert_eq!(parse_datetime(None), None);
    }
}
