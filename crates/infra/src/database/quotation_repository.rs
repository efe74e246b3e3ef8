//! SQLite implementation of the quotation port.
//!
//! Status moves are compare-and-set inside an immediate transaction and
//! append a row to `quotation_status_history`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderbridge_core::QuotationRepository;
use orderbridge_domain::{Quotation, QuotationItem, QuotationStatus, Result as DomainResult};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};
use super::sql::{
    boxed, opt_ts, opt_ts_at, opt_uuid, opt_uuid_at, parsed_at, placeholders, ts, ts_at, uuid_at,
    with_connection,
};

pub struct SqliteQuotationRepository {
    db: Arc<DbManager>,
}

impl SqliteQuotationRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Status history rows for one quotation, oldest first, as
    /// `(from, to, note)`.
    pub async fn status_history(
        &self,
        id: Uuid,
    ) -> DomainResult<Vec<(Option<QuotationStatus>, QuotationStatus, Option<String>)>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn.prepare(HISTORY_SELECT_SQL).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![id.to_string()], |row| {
                    let from: Option<String> = row.get(0)?;
                    let from = from.and_then(|raw| raw.parse::<QuotationStatus>().ok());
                    Ok((from, parsed_at::<QuotationStatus>(row, 1)?, row.get(2)?))
                })
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}

pub(crate) fn load_quotation(conn: &Connection, id: Uuid) -> DomainResult<Option<Quotation>> {
    let quotation = conn
        .query_row(QUOTATION_SELECT_SQL, params![id.to_string()], map_quotation_row)
        .optional()
        .map_err(map_sql_error)?;

    let Some(mut quotation) = quotation else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(ITEMS_SELECT_SQL).map_err(map_sql_error)?;
    quotation.items = stmt
        .query_map(params![id.to_string()], map_item_row)
        .map_err(map_sql_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_sql_error)?;

    Ok(Some(quotation))
}

pub(crate) fn record_transition(
    conn: &Connection,
    id: Uuid,
    from: Option<QuotationStatus>,
    to: QuotationStatus,
    note: Option<&str>,
    at: DateTime<Utc>,
) -> DomainResult<()> {
    conn.execute(
        HISTORY_INSERT_SQL,
        params![id.to_string(), from.map(|s| s.as_str()), to.as_str(), note, ts(at)],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

#[async_trait]
impl QuotationRepository for SqliteQuotationRepository {
    async fn insert(&self, quotation: &Quotation) -> DomainResult<()> {
        let quotation = quotation.clone();
        with_connection(&self.db, move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            tx.execute(
                QUOTATION_INSERT_SQL,
                params![
                    quotation.id.to_string(),
                    quotation.org_id.to_string(),
                    opt_uuid(quotation.branch_id),
                    opt_uuid(quotation.customer_id),
                    quotation.number,
                    quotation.total_cents,
                    quotation.currency,
                    quotation.status.as_str(),
                    opt_ts(quotation.valid_until),
                    quotation.notes,
                    quotation.external_estimate_id,
                    ts(quotation.created_at),
                    ts(quotation.updated_at),
                ],
            )
            .map_err(map_sql_error)?;

            for (position, item) in quotation.items.iter().enumerate() {
                tx.execute(
                    ITEM_INSERT_SQL,
                    params![
                        quotation.id.to_string(),
                        i64::try_from(position).unwrap_or(i64::MAX),
                        item.product_id.to_string(),
                        item.description,
                        item.quantity,
                        item.unit_price_cents,
                        item.subtotal_cents,
                    ],
                )
                .map_err(map_sql_error)?;
            }

            record_transition(&tx, quotation.id, None, quotation.status, None, quotation.created_at)?;
            tx.commit().map_err(map_sql_error)
        })
        .await
    }

    async fn find(&self, id: Uuid) -> DomainResult<Option<Quotation>> {
        with_connection(&self.db, move |conn| load_quotation(conn, id)).await
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expected: &[QuotationStatus],
        next: QuotationStatus,
        note: Option<&str>,
    ) -> DomainResult<bool> {
        if expected.is_empty() {
            return Ok(false);
        }
        let expected = expected.to_vec();
        let note = note.map(ToOwned::to_owned);

        with_connection(&self.db, move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let current: Option<QuotationStatus> = tx
                .query_row(STATUS_SELECT_SQL, params![id.to_string()], |row| parsed_at(row, 0))
                .optional()
                .map_err(map_sql_error)?;

            let Some(current) = current.filter(|status| expected.contains(status)) else {
                return Ok(false);
            };

            let now = Utc::now();
            let sql = format!(
                "UPDATE quotations SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({})",
                placeholders(4, expected.len())
            );
            let mut values: Vec<Box<dyn ToSql + Send>> =
                vec![boxed(next.as_str()), boxed(ts(now)), boxed(id.to_string())];
            values.extend(expected.iter().map(|status| boxed(status.as_str())));

            let changed = tx
                .execute(&sql, rusqlite::params_from_iter(values.iter()))
                .map_err(map_sql_error)?;
            if changed == 0 {
                return Ok(false);
            }

            record_transition(&tx, id, Some(current), next, note.as_deref(), now)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(true)
        })
        .await
    }

    async fn set_external_estimate_id(&self, id: Uuid, estimate_id: &str) -> DomainResult<()> {
        let estimate_id = estimate_id.to_owned();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE quotations SET external_estimate_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![estimate_id, ts(Utc::now()), id.to_string()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn find_expirable(&self, now: DateTime<Utc>) -> DomainResult<Vec<Quotation>> {
        with_connection(&self.db, move |conn| {
            let sql = format!(
                "SELECT id FROM quotations WHERE valid_until IS NOT NULL AND valid_until < ?1 AND status IN ({}) ORDER BY valid_until",
                placeholders(2, QuotationStatus::EXPIRABLE.len())
            );
            let mut values: Vec<Box<dyn ToSql + Send>> = vec![boxed(ts(now))];
            values.extend(QuotationStatus::EXPIRABLE.iter().map(|status| boxed(status.as_str())));

            let ids = {
                let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(values.iter()), |row| uuid_at(row, 0))
                    .map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)?
            };

            let mut quotations = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(quotation) = load_quotation(conn, id)? {
                    quotations.push(quotation);
                }
            }
            Ok(quotations)
        })
        .await
    }
}

const QUOTATION_INSERT_SQL: &str = "INSERT INTO quotations (
        id, org_id, branch_id, customer_id, number, total_cents, currency, status,
        valid_until, notes, external_estimate_id, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

const QUOTATION_SELECT_SQL: &str = "SELECT
        id, org_id, branch_id, customer_id, number, total_cents, currency, status,
        valid_until, notes, external_estimate_id, created_at, updated_at
    FROM quotations WHERE id = ?1";

const ITEM_INSERT_SQL: &str = "INSERT INTO quotation_items (
        quotation_id, position, product_id, description, quantity, unit_price_cents, subtotal_cents
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const ITEMS_SELECT_SQL: &str = "SELECT
        quotation_id, product_id, description, quantity, unit_price_cents, subtotal_cents
    FROM quotation_items WHERE quotation_id = ?1 ORDER BY position";

const STATUS_SELECT_SQL: &str = "SELECT status FROM quotations WHERE id = ?1";

const HISTORY_INSERT_SQL: &str = "INSERT INTO quotation_status_history
        (quotation_id, from_status, to_status, note, changed_at) VALUES (?1, ?2, ?3, ?4, ?5)";

const HISTORY_SELECT_SQL: &str = "SELECT from_status, to_status, note
    FROM quotation_status_history WHERE quotation_id = ?1 ORDER BY id";

fn map_quotation_row(row: &Row<'_>) -> rusqlite::Result<Quotation> {
    Ok(Quotation {
        id: uuid_at(row, 0)?,
        org_id: uuid_at(row, 1)?,
        branch_id: opt_uuid_at(row, 2)?,
        customer_id: opt_uuid_at(row, 3)?,
        number: row.get(4)?,
        total_cents: row.get(5)?,
        currency: row.get(6)?,
        status: parsed_at(row, 7)?,
        valid_until: opt_ts_at(row, 8)?,
        notes: row.get(9)?,
        external_estimate_id: row.get(10)?,
        items: Vec::new(),
        created_at: ts_at(row, 11)?,
        updated_at: ts_at(row, 12)?,
    })
}

fn map_item_row(row: &Row<'_>) -> rusqlite::Result<QuotationItem> {
    Ok(QuotationItem {
        quotation_id: uuid_at(row, 0)?,
        product_id: uuid_at(row, 1)?,
        description: row.get(2)?,
        quantity: row.get(3)?,
        unit_price_cents: row.get(4)?,
        subtotal_cents: row.get(5)?,
    })
}
