use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use log::error;

use crate::db::models::{
    Contract, EntityKind, EntityRecord, Lot, NewRawRecord, Participant, RawStatus, SyncCheckpoint,
    SyncStatus, TrdBuy,
};
use crate::db::postgres::PostgresClient;
use crate::db::store::{ProcurementStore, Upserted};

/// Sanitize a string for PostgreSQL by removing null bytes (0x00)
/// which are invalid in UTF-8 text columns
fn sanitize(s: &Option<String>) -> Option<String> {
    s.as_ref().map(|v| v.replace('\0', ""))
}

/// Render a decimal for binding through a `::text::numeric` cast.
fn dec(v: &Option<BigDecimal>) -> Option<String> {
    v.as_ref().map(|d| d.to_string())
}

/// Checkpoints for year-agnostic entities are stored under year 0.
fn year_key(year: Option<i32>) -> i32 {
    year.unwrap_or(0)
}

impl PostgresClient {
    // ==================== ENTITY UPSERTS ====================

    /// Insert-or-update an announcement by `goszakup_id`.
    ///
    /// `xmax = 0` holds only for freshly inserted row versions, which is how
    /// one round trip distinguishes a create from an update.
    async fn upsert_trd_buy(&self, t: &TrdBuy) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO trd_buy (
                goszakup_id, number, name_ru, name_kz,
                customer_bin, customer_name_ru, customer_name_kz, lots_count,
                application_start_date, application_end_date, publish_date,
                purchase_type_ru, purchase_type_kz, status_ru, status_kz,
                total_sum, year, raw_data, last_synced_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16::text::numeric, $17, $18, $19
            )
            ON CONFLICT (goszakup_id) DO UPDATE SET
                number = EXCLUDED.number,
                name_ru = EXCLUDED.name_ru,
                name_kz = EXCLUDED.name_kz,
                customer_bin = EXCLUDED.customer_bin,
                customer_name_ru = EXCLUDED.customer_name_ru,
                customer_name_kz = EXCLUDED.customer_name_kz,
                lots_count = EXCLUDED.lots_count,
                application_start_date = EXCLUDED.application_start_date,
                application_end_date = EXCLUDED.application_end_date,
                publish_date = EXCLUDED.publish_date,
                purchase_type_ru = EXCLUDED.purchase_type_ru,
                purchase_type_kz = EXCLUDED.purchase_type_kz,
                status_ru = EXCLUDED.status_ru,
                status_kz = EXCLUDED.status_kz,
                total_sum = EXCLUDED.total_sum,
                year = EXCLUDED.year,
                raw_data = EXCLUDED.raw_data,
                last_synced_at = EXCLUDED.last_synced_at
            RETURNING (xmax = 0) AS created
        "#;

        let row = client
            .query_one(
                query,
                &[
                    &t.goszakup_id,
                    &sanitize(&t.number),
                    &sanitize(&t.name_ru),
                    &sanitize(&t.name_kz),
                    &t.customer_bin,
                    &sanitize(&t.customer_name_ru),
                    &sanitize(&t.customer_name_kz),
                    &t.lots_count,
                    &t.application_start_date,
                    &t.application_end_date,
                    &t.publish_date,
                    &t.purchase_type_ru,
                    &t.purchase_type_kz,
                    &t.status_ru,
                    &t.status_kz,
                    &dec(&t.total_sum),
                    &t.year,
                    &t.raw_data,
                    &t.last_synced_at,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to upsert trd_buy {}: {:?}", t.goszakup_id, e);
                e
            })?;

        Ok(row.get("created"))
    }

    async fn upsert_lot(&self, l: &Lot) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO lots (
                goszakup_id, lot_number, trd_buy_id,
                description_ru, description_kz,
                ktru_code, ktru_name_ru, ktru_name_kz,
                quantity, price_per_unit, total_sum,
                status_ru, status_kz,
                delivery_place_ru, delivery_place_kz, delivery_term,
                raw_data, last_synced_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8,
                $9::text::numeric, $10::text::numeric, $11::text::numeric,
                $12, $13, $14, $15, $16, $17, $18
            )
            ON CONFLICT (goszakup_id) DO UPDATE SET
                lot_number = EXCLUDED.lot_number,
                trd_buy_id = EXCLUDED.trd_buy_id,
                description_ru = EXCLUDED.description_ru,
                description_kz = EXCLUDED.description_kz,
                ktru_code = EXCLUDED.ktru_code,
                ktru_name_ru = EXCLUDED.ktru_name_ru,
                ktru_name_kz = EXCLUDED.ktru_name_kz,
                quantity = EXCLUDED.quantity,
                price_per_unit = EXCLUDED.price_per_unit,
                total_sum = EXCLUDED.total_sum,
                status_ru = EXCLUDED.status_ru,
                status_kz = EXCLUDED.status_kz,
                delivery_place_ru = EXCLUDED.delivery_place_ru,
                delivery_place_kz = EXCLUDED.delivery_place_kz,
                delivery_term = EXCLUDED.delivery_term,
                raw_data = EXCLUDED.raw_data,
                last_synced_at = EXCLUDED.last_synced_at
            RETURNING (xmax = 0) AS created
        "#;

        let row = client
            .query_one(
                query,
                &[
                    &l.goszakup_id,
                    &sanitize(&l.lot_number),
                    &l.trd_buy_id,
                    &sanitize(&l.description_ru),
                    &sanitize(&l.description_kz),
                    &l.ktru_code,
                    &sanitize(&l.ktru_name_ru),
                    &sanitize(&l.ktru_name_kz),
                    &dec(&l.quantity),
                    &dec(&l.price_per_unit),
                    &dec(&l.total_sum),
                    &l.status_ru,
                    &l.status_kz,
                    &sanitize(&l.delivery_place_ru),
                    &sanitize(&l.delivery_place_kz),
                    &l.delivery_term,
                    &l.raw_data,
                    &l.last_synced_at,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to upsert lot {}: {:?}", l.goszakup_id, e);
                e
            })?;

        Ok(row.get("created"))
    }

    async fn upsert_contract(&self, c: &Contract) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO contracts (
                goszakup_id, contract_number, lot_id,
                description_ru, description_kz,
                sum, supplier_sum,
                customer_bin, customer_name_ru, customer_name_kz,
                supplier_bin, supplier_name_ru, supplier_name_kz,
                sign_date, start_date, end_date,
                status_ru, status_kz, year,
                raw_data, last_synced_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6::text::numeric, $7::text::numeric,
                $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
            )
            ON CONFLICT (goszakup_id) DO UPDATE SET
                contract_number = EXCLUDED.contract_number,
                lot_id = EXCLUDED.lot_id,
                description_ru = EXCLUDED.description_ru,
                description_kz = EXCLUDED.description_kz,
                sum = EXCLUDED.sum,
                supplier_sum = EXCLUDED.supplier_sum,
                customer_bin = EXCLUDED.customer_bin,
                customer_name_ru = EXCLUDED.customer_name_ru,
                customer_name_kz = EXCLUDED.customer_name_kz,
                supplier_bin = EXCLUDED.supplier_bin,
                supplier_name_ru = EXCLUDED.supplier_name_ru,
                supplier_name_kz = EXCLUDED.supplier_name_kz,
                sign_date = EXCLUDED.sign_date,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                status_ru = EXCLUDED.status_ru,
                status_kz = EXCLUDED.status_kz,
                year = EXCLUDED.year,
                raw_data = EXCLUDED.raw_data,
                last_synced_at = EXCLUDED.last_synced_at
            RETURNING (xmax = 0) AS created
        "#;

        let row = client
            .query_one(
                query,
                &[
                    &c.goszakup_id,
                    &sanitize(&c.contract_number),
                    &c.lot_id,
                    &sanitize(&c.description_ru),
                    &sanitize(&c.description_kz),
                    &dec(&c.sum),
                    &dec(&c.supplier_sum),
                    &c.customer_bin,
                    &sanitize(&c.customer_name_ru),
                    &sanitize(&c.customer_name_kz),
                    &c.supplier_bin,
                    &sanitize(&c.supplier_name_ru),
                    &sanitize(&c.supplier_name_kz),
                    &c.sign_date,
                    &c.start_date,
                    &c.end_date,
                    &c.status_ru,
                    &c.status_kz,
                    &c.year,
                    &c.raw_data,
                    &c.last_synced_at,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to upsert contract {}: {:?}", c.goszakup_id, e);
                e
            })?;

        Ok(row.get("created"))
    }

    /// Participants are keyed by `natural_id` (BIN, falling back to IIN).
    async fn upsert_participant(&self, p: &Participant) -> anyhow::Result<bool> {
        let natural_id = p
            .identifier()
            .ok_or_else(|| anyhow::anyhow!("participant without BIN/IIN"))?
            .to_string();

        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO participants (
                natural_id, bin, iin,
                name_ru, name_kz, name_en,
                email, phone, address_ru, address_kz, region_code,
                is_active, participant_type, registration_date, oked_code,
                raw_data, last_synced_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17
            )
            ON CONFLICT (natural_id) DO UPDATE SET
                bin = EXCLUDED.bin,
                iin = EXCLUDED.iin,
                name_ru = EXCLUDED.name_ru,
                name_kz = EXCLUDED.name_kz,
                name_en = EXCLUDED.name_en,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                address_ru = EXCLUDED.address_ru,
                address_kz = EXCLUDED.address_kz,
                region_code = EXCLUDED.region_code,
                is_active = EXCLUDED.is_active,
                participant_type = EXCLUDED.participant_type,
                registration_date = EXCLUDED.registration_date,
                oked_code = EXCLUDED.oked_code,
                raw_data = EXCLUDED.raw_data,
                last_synced_at = EXCLUDED.last_synced_at
            RETURNING (xmax = 0) AS created
        "#;

        let row = client
            .query_one(
                query,
                &[
                    &natural_id,
                    &p.bin,
                    &p.iin,
                    &sanitize(&p.name_ru),
                    &sanitize(&p.name_kz),
                    &sanitize(&p.name_en),
                    &p.email,
                    &p.phone,
                    &sanitize(&p.address_ru),
                    &sanitize(&p.address_kz),
                    &p.region_code,
                    &p.is_active,
                    &p.participant_type,
                    &p.registration_date,
                    &p.oked_code,
                    &p.raw_data,
                    &p.last_synced_at,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to upsert participant {}: {:?}", natural_id, e);
                e
            })?;

        Ok(row.get("created"))
    }
}

// ==================== STORE IMPLEMENTATION ====================

#[async_trait]
impl ProcurementStore for PostgresClient {
    async fn upsert(&self, record: &EntityRecord) -> anyhow::Result<Upserted> {
        let created = match record {
            EntityRecord::TrdBuy(t) => self.upsert_trd_buy(t).await?,
            EntityRecord::Lot(l) => self.upsert_lot(l).await?,
            EntityRecord::Contract(c) => self.upsert_contract(c).await?,
            EntityRecord::Participant(p) => self.upsert_participant(p).await?,
        };
        Ok(Upserted { created })
    }

    async fn insert_raw(&self, raw: &NewRawRecord) -> anyhow::Result<i64> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO raw_data (
                endpoint, query_params, response_body, status_code,
                requested_at, year, processed, content_hash
            ) VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            RETURNING id
        "#;

        let row = client
            .query_one(
                query,
                &[
                    &raw.endpoint,
                    &raw.query_params,
                    &raw.response_body,
                    &raw.status_code,
                    &raw.requested_at,
                    &raw.year,
                    &raw.content_hash,
                ],
            )
            .await?;

        Ok(row.get("id"))
    }

    async fn mark_raw_processed(
        &self,
        raw_id: i64,
        status: RawStatus,
        error_msg: Option<&str>,
    ) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE raw_data
                SET processed = $2, processed_at = NOW(), processing_error = $3
                WHERE id = $1
                "#,
                &[&raw_id, &status.as_str(), &error_msg],
            )
            .await?;
        Ok(())
    }

    async fn get_checkpoint(
        &self,
        entity: EntityKind,
        year: Option<i32>,
    ) -> anyhow::Result<Option<SyncCheckpoint>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT last_success_at, last_status, last_error, updated_at
                FROM sync_checkpoints
                WHERE entity_type = $1 AND year = $2
                "#,
                &[&entity.as_str(), &year_key(year)],
            )
            .await?;

        Ok(row.map(|row| {
            let status: String = row.get("last_status");
            SyncCheckpoint {
                entity,
                year,
                last_success_at: row.get("last_success_at"),
                last_status: SyncStatus::parse(&status),
                last_error: row.get("last_error"),
                updated_at: row.get("updated_at"),
            }
        }))
    }

    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO sync_checkpoints (
                    entity_type, year, last_success_at, last_status, last_error, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (entity_type, year) DO UPDATE SET
                    last_success_at = EXCLUDED.last_success_at,
                    last_status = EXCLUDED.last_status,
                    last_error = EXCLUDED.last_error,
                    updated_at = EXCLUDED.updated_at
                "#,
                &[
                    &checkpoint.entity.as_str(),
                    &year_key(checkpoint.year),
                    &checkpoint.last_success_at,
                    &checkpoint.last_status.as_str(),
                    &checkpoint.last_error,
                    &checkpoint.updated_at,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    "Failed to save checkpoint for {} ({:?}): {:?}",
                    checkpoint.entity, checkpoint.year, e
                );
                e
            })?;
        Ok(())
    }

    async fn delete_raw_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM raw_data WHERE requested_at < $1", &[&cutoff])
            .await?;
        Ok(deleted)
    }
}
