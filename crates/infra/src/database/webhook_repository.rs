//! Append-only ledger of inbound gateway and ERP callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use orderbridge_core::WebhookEventRepository;
use orderbridge_domain::{CommerceError, Result as DomainResult, WebhookEvent};
use rusqlite::{params, Row};
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};
use super::sql::{
    opt_ts, opt_ts_at, opt_uuid, opt_uuid_at, parsed_at, ts, ts_at, usize_to_i64, uuid_at,
    with_connection,
};

pub struct SqliteWebhookEventRepository {
    db: Arc<DbManager>,
}

impl SqliteWebhookEventRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WebhookEventRepository for SqliteWebhookEventRepository {
    async fn append(&self, event: &WebhookEvent) -> DomainResult<()> {
        let event = event.clone();
        let payload = serde_json::to_string(&event.payload)
            .map_err(|e| CommerceError::Internal(format!("webhook payload encode: {e}")))?;
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO webhook_events (
                    id, source, event_type, payload, order_id, status, error, correlation_id,
                    created_at, processed_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    event.id.to_string(),
                    event.source.as_str(),
                    event.event_type,
                    payload,
                    opt_uuid(event.order_id),
                    event.status.as_str(),
                    event.error,
                    event.correlation_id,
                    ts(event.created_at),
                    opt_ts(event.processed_at),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn find_by_order(&self, order_id: Uuid) -> DomainResult<Vec<WebhookEvent>> {
        with_connection(&self.db, move |conn| {
            let sql = format!("{EVENT_SELECT_SQL} WHERE order_id = ?1 ORDER BY created_at, rowid");
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows =
                stmt.query_map(params![order_id.to_string()], map_event_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }

    async fn list_failed(&self, limit: usize) -> DomainResult<Vec<WebhookEvent>> {
        with_connection(&self.db, move |conn| {
            let sql = format!(
                "{EVENT_SELECT_SQL} WHERE status = 'failed' ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows =
                stmt.query_map(params![usize_to_i64(limit)], map_event_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}

const EVENT_SELECT_SQL: &str = "SELECT
        id, source, event_type, payload, order_id, status, error, correlation_id,
        created_at, processed_at
    FROM webhook_events";

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<WebhookEvent> {
    let raw: String = row.get(3)?;
    let payload = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(WebhookEvent {
        id: uuid_at(row, 0)?,
        source: parsed_at(row, 1)?,
        event_type: row.get(2)?,
        payload,
        order_id: opt_uuid_at(row, 4)?,
        status: parsed_at(row, 5)?,
        error: row.get(6)?,
        correlation_id: row.get(7)?,
        created_at: ts_at(row, 8)?,
        processed_at: opt_ts_at(row, 9)?,
    })
}
