use std::sync::Arc;

use async_trait::async_trait;
use orderbridge_core::InvoiceRepository;
use orderbridge_domain::{Invoice, InvoiceStatus, Result as DomainResult};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};
use super::sql::{parsed_at, uuid_at, with_connection};

pub struct SqliteInvoiceRepository {
    db: Arc<DbManager>,
}

impl SqliteInvoiceRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InvoiceRepository for SqliteInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> DomainResult<()> {
        let invoice = invoice.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO invoices (id, org_id, order_id, number, status, total_cents, pdf_url, external_invoice_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    invoice.id.to_string(),
                    invoice.org_id.to_string(),
                    invoice.order_id.to_string(),
                    invoice.number,
                    invoice.status.as_str(),
                    invoice.total_cents,
                    invoice.pdf_url,
                    invoice.external_invoice_id,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn find_by_order(&self, order_id: Uuid) -> DomainResult<Option<Invoice>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT id, org_id, order_id, number, status, total_cents, pdf_url, external_invoice_id
                 FROM invoices WHERE order_id = ?1",
                params![order_id.to_string()],
                map_invoice_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn update_status_by_external_id(
        &self,
        org_id: Uuid,
        invoice_id: &str,
        status: InvoiceStatus,
    ) -> DomainResult<bool> {
        let invoice_id = invoice_id.to_owned();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE invoices SET status = ?1 WHERE org_id = ?2 AND external_invoice_id = ?3",
                    params![status.as_str(), org_id.to_string(), invoice_id],
                )
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
    }
}

fn map_invoice_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: uuid_at(row, 0)?,
        org_id: uuid_at(row, 1)?,
        order_id: uuid_at(row, 2)?,
        number: row.get(3)?,
        status: parsed_at(row, 4)?,
        total_cents: row.get(5)?,
        pdf_url: row.get(6)?,
        external_invoice_id: row.get(7)?,
    })
}
