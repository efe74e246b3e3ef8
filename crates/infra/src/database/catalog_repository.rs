//! Product catalog mirrored from the ERP.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use orderbridge_core::CatalogRepository;
use orderbridge_domain::{ErpItem, Product, Result as DomainResult, UpsertOutcome};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};
use super::sql::{ts, ts_at, uuid_at, with_connection};

pub struct SqliteCatalogRepository {
    db: Arc<DbManager>,
}

impl SqliteCatalogRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Every product of an organization, ordered by SKU.
    pub async fn list_products(&self, org_id: Uuid) -> DomainResult<Vec<Product>> {
        with_connection(&self.db, move |conn| {
            let sql = format!("{PRODUCT_SELECT_SQL} WHERE org_id = ?1 ORDER BY sku");
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows =
                stmt.query_map(params![org_id.to_string()], map_product_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}

/// Insert or refresh one product keyed by `(org_id, natural key)`.
fn upsert(conn: &Connection, org_id: Uuid, item: &ErpItem, currency: &str) -> DomainResult<UpsertOutcome> {
    let sku = item.natural_key();
    let now = ts(Utc::now());

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM products WHERE org_id = ?1 AND sku = ?2",
            params![org_id.to_string(), sku],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_sql_error)?;

    match existing {
        Some(id) => {
            conn.execute(
                PRODUCT_UPDATE_SQL,
                params![
                    item.name,
                    item.description,
                    item.rate_cents,
                    item.stock_on_hand,
                    item.item_id,
                    item.active,
                    now,
                    id,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(UpsertOutcome::Updated)
        }
        None => {
            conn.execute(
                PRODUCT_INSERT_SQL,
                params![
                    Uuid::now_v7().to_string(),
                    org_id.to_string(),
                    sku,
                    item.name,
                    item.description,
                    item.rate_cents,
                    currency,
                    item.stock_on_hand,
                    item.item_id,
                    item.active,
                    now,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(UpsertOutcome::Created)
        }
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn upsert_product(
        &self,
        org_id: Uuid,
        item: &ErpItem,
        currency: &str,
    ) -> DomainResult<UpsertOutcome> {
        let item = item.clone();
        let currency = currency.to_owned();
        with_connection(&self.db, move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;
            let outcome = upsert(&tx, org_id, &item, &currency)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(outcome)
        })
        .await
    }

    async fn upsert_products_atomically(
        &self,
        org_id: Uuid,
        items: &[ErpItem],
        currency: &str,
    ) -> DomainResult<Vec<UpsertOutcome>> {
        let items = items.to_vec();
        let currency = currency.to_owned();
        with_connection(&self.db, move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;
            // dropping `tx` on the error path rolls the whole chunk back
            let outcomes = items
                .iter()
                .map(|item| upsert(&tx, org_id, item, &currency))
                .collect::<DomainResult<Vec<_>>>()?;
            tx.commit().map_err(map_sql_error)?;
            Ok(outcomes)
        })
        .await
    }

    async fn find_product(&self, id: Uuid) -> DomainResult<Option<Product>> {
        with_connection(&self.db, move |conn| {
            let sql = format!("{PRODUCT_SELECT_SQL} WHERE id = ?1");
            conn.query_row(&sql, params![id.to_string()], map_product_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }

    async fn find_by_external_id(&self, org_id: Uuid, item_id: &str) -> DomainResult<Option<Product>> {
        let item_id = item_id.to_owned();
        with_connection(&self.db, move |conn| {
            let sql = format!("{PRODUCT_SELECT_SQL} WHERE org_id = ?1 AND external_item_id = ?2");
            conn.query_row(&sql, params![org_id.to_string(), item_id], map_product_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }

    async fn deactivate_by_external_id(&self, org_id: Uuid, item_id: &str) -> DomainResult<bool> {
        let item_id = item_id.to_owned();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE products SET active = 0, updated_at = ?1 WHERE org_id = ?2 AND external_item_id = ?3",
                    params![ts(Utc::now()), org_id.to_string(), item_id],
                )
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
    }
}

const PRODUCT_INSERT_SQL: &str = "INSERT INTO products (
        id, org_id, sku, name, description, price_cents, currency, stock_on_hand,
        external_item_id, active, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const PRODUCT_UPDATE_SQL: &str = "UPDATE products SET
        name = ?1, description = ?2, price_cents = ?3, stock_on_hand = ?4,
        external_item_id = ?5, active = ?6, updated_at = ?7
    WHERE id = ?8";

const PRODUCT_SELECT_SQL: &str = "SELECT
        id, org_id, sku, name, description, price_cents, currency, stock_on_hand,
        external_item_id, active, updated_at
    FROM products";

fn map_product_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: uuid_at(row, 0)?,
        org_id: uuid_at(row, 1)?,
        sku: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        price_cents: row.get(5)?,
        currency: row.get(6)?,
        stock_on_hand: row.get(7)?,
        external_item_id: row.get(8)?,
        active: row.get(9)?,
        updated_at: ts_at(row, 10)?,
    })
}
