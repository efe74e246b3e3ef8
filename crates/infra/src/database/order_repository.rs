//! SQLite implementation of the order port.
//!
//! `orders.quotation_id` is unique, so a second order for the same quotation
//! fails inside the insert transaction with `Conflict` regardless of which
//! process raced to create it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use orderbridge_core::OrderRepository;
use orderbridge_domain::{
    CommerceError, Order, OrderItem, OrderStatus, QuotationStatus, Result as DomainResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};
use super::quotation_repository::record_transition;
use super::sql::{
    boxed, opt_uuid, opt_uuid_at, parsed_at, placeholders, ts, ts_at, uuid_at, with_connection,
};

pub struct SqliteOrderRepository {
    db: Arc<DbManager>,
}

impl SqliteOrderRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn find_where(&self, column: &'static str, value: String) -> DomainResult<Option<Order>> {
        with_connection(&self.db, move |conn| {
            let sql = format!("{ORDER_SELECT_SQL} WHERE {column} = ?1");
            let order = conn
                .query_row(&sql, params![value], map_order_row)
                .optional()
                .map_err(map_sql_error)?;
            order.map(|order| with_items(conn, order)).transpose()
        })
        .await
    }

    /// Conditional `UPDATE orders SET <assignments> WHERE id = ? AND status IN (..)`.
    async fn update_if(
        &self,
        id: Uuid,
        expected: &[OrderStatus],
        assignments: &'static str,
        mut values: Vec<Box<dyn ToSql + Send>>,
    ) -> DomainResult<bool> {
        if expected.is_empty() {
            return Ok(false);
        }
        let expected = expected.to_vec();

        with_connection(&self.db, move |conn| {
            let id_idx = values.len() + 1;
            let sql = format!(
                "UPDATE orders SET {assignments} WHERE id = ?{id_idx} AND status IN ({})",
                placeholders(id_idx + 1, expected.len())
            );
            values.push(boxed(id.to_string()));
            values.extend(expected.iter().map(|status| boxed(status.as_str())));

            let changed = conn
                .execute(&sql, rusqlite::params_from_iter(values.iter()))
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
    }
}

fn with_items(conn: &Connection, mut order: Order) -> DomainResult<Order> {
    let mut stmt = conn.prepare(ITEMS_SELECT_SQL).map_err(map_sql_error)?;
    order.items = stmt
        .query_map(params![order.id.to_string()], map_item_row)
        .map_err(map_sql_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_sql_error)?;
    Ok(order)
}

/// Move the quotation to converted inside the caller's transaction, or
/// explain why it cannot be.
fn convert_quotation(conn: &Connection, quotation_id: Uuid) -> DomainResult<()> {
    let sql = format!(
        "UPDATE quotations SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({})",
        placeholders(4, QuotationStatus::CONVERTIBLE.len())
    );
    let now = Utc::now();
    let mut values: Vec<Box<dyn ToSql + Send>> = vec![
        boxed(QuotationStatus::Converted.as_str()),
        boxed(ts(now)),
        boxed(quotation_id.to_string()),
    ];
    values.extend(QuotationStatus::CONVERTIBLE.iter().map(|s| boxed(s.as_str())));

    let current: Option<QuotationStatus> = conn
        .query_row(
            "SELECT status FROM quotations WHERE id = ?1",
            params![quotation_id.to_string()],
            |row| parsed_at(row, 0),
        )
        .optional()
        .map_err(map_sql_error)?;
    let current =
        current.ok_or_else(|| CommerceError::NotFound(format!("quotation {quotation_id}")))?;

    let changed =
        conn.execute(&sql, rusqlite::params_from_iter(values.iter())).map_err(map_sql_error)?;
    if changed == 0 {
        return Err(CommerceError::Conflict(format!("quotation {quotation_id} is {current}")));
    }

    record_transition(conn, quotation_id, Some(current), QuotationStatus::Converted, None, now)
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn insert_for_quotation(&self, order: &Order, convert: bool) -> DomainResult<()> {
        let order = order.clone();
        with_connection(&self.db, move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            if let (true, Some(quotation_id)) = (convert, order.quotation_id) {
                convert_quotation(&tx, quotation_id)?;
            }

            tx.execute(
                ORDER_INSERT_SQL,
                params![
                    order.id.to_string(),
                    order.org_id.to_string(),
                    opt_uuid(order.branch_id),
                    opt_uuid(order.customer_id),
                    opt_uuid(order.quotation_id),
                    order.number,
                    order.total_cents,
                    order.currency,
                    order.status.as_str(),
                    order.gateway_tran_ref,
                    order.gateway_payment_id,
                    order.external_sales_order_id,
                    order.external_invoice_id,
                    ts(order.created_at),
                    ts(order.updated_at),
                ],
            )
            .map_err(map_sql_error)?;

            for (position, item) in order.items.iter().enumerate() {
                tx.execute(
                    ITEM_INSERT_SQL,
                    params![
                        order.id.to_string(),
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

            tx.commit().map_err(map_sql_error)
        })
        .await
    }

    async fn find(&self, id: Uuid) -> DomainResult<Option<Order>> {
        self.find_where("id", id.to_string()).await
    }

    async fn find_by_tran_ref(&self, tran_ref: &str) -> DomainResult<Option<Order>> {
        self.find_where("gateway_tran_ref", tran_ref.to_owned()).await
    }

    async fn find_by_quotation(&self, quotation_id: Uuid) -> DomainResult<Option<Order>> {
        self.find_where("quotation_id", quotation_id.to_string()).await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: &[OrderStatus],
        next: OrderStatus,
        payment_id: Option<&str>,
    ) -> DomainResult<bool> {
        self.update_if(
            id,
            expected,
            "status = ?1, updated_at = ?2, gateway_payment_id = COALESCE(?3, gateway_payment_id)",
            vec![
                boxed(next.as_str()),
                boxed(ts(Utc::now())),
                boxed(payment_id.map(ToOwned::to_owned)),
            ],
        )
        .await
    }

    async fn assign_tran_ref(
        &self,
        id: Uuid,
        expected: &[OrderStatus],
        tran_ref: &str,
    ) -> DomainResult<bool> {
        self.update_if(
            id,
            expected,
            "status = ?1, updated_at = ?2, gateway_tran_ref = ?3",
            vec![
                boxed(OrderStatus::AwaitingPayment.as_str()),
                boxed(ts(Utc::now())),
                boxed(tran_ref.to_owned()),
            ],
        )
        .await
    }

    async fn set_external_sales_order_id(&self, id: Uuid, sales_order_id: &str) -> DomainResult<()> {
        let sales_order_id = sales_order_id.to_owned();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE orders SET external_sales_order_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![sales_order_id, ts(Utc::now()), id.to_string()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn set_external_invoice_id(&self, id: Uuid, invoice_id: &str) -> DomainResult<()> {
        let invoice_id = invoice_id.to_owned();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE orders SET external_invoice_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![invoice_id, ts(Utc::now()), id.to_string()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }
}

const ORDER_INSERT_SQL: &str = "INSERT INTO orders (
        id, org_id, branch_id, customer_id, quotation_id, number, total_cents, currency, status,
        gateway_tran_ref, gateway_payment_id, external_sales_order_id, external_invoice_id,
        created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)";

const ORDER_SELECT_SQL: &str = "SELECT
        id, org_id, branch_id, customer_id, quotation_id, number, total_cents, currency, status,
        gateway_tran_ref, gateway_payment_id, external_sales_order_id, external_invoice_id,
        created_at, updated_at
    FROM orders";

const ITEM_INSERT_SQL: &str = "INSERT INTO order_items (
        order_id, position, product_id, description, quantity, unit_price_cents, subtotal_cents
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const ITEMS_SELECT_SQL: &str = "SELECT
        order_id, product_id, description, quantity, unit_price_cents, subtotal_cents
    FROM order_items WHERE order_id = ?1 ORDER BY position";

fn map_order_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: uuid_at(row, 0)?,
        org_id: uuid_at(row, 1)?,
        branch_id: opt_uuid_at(row, 2)?,
        customer_id: opt_uuid_at(row, 3)?,
        quotation_id: opt_uuid_at(row, 4)?,
        number: row.get(5)?,
        total_cents: row.get(6)?,
        currency: row.get(7)?,
        status: parsed_at(row, 8)?,
        gateway_tran_ref: row.get(9)?,
        gateway_payment_id: row.get(10)?,
        external_sales_order_id: row.get(11)?,
        external_invoice_id: row.get(12)?,
        items: Vec::new(),
        created_at: ts_at(row, 13)?,
        updated_at: ts_at(row, 14)?,
    })
}

fn map_item_row(row: &Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        order_id: uuid_at(row, 0)?,
        product_id: uuid_at(row, 1)?,
        description: row.get(2)?,
        quantity: row.get(3)?,
        unit_price_cents: row.get(4)?,
        subtotal_cents: row.get(5)?,
    })
}
