//! OAuth connections to the ERP, one row per organization.
//!
//! Token refreshes race across workers; `replace_if_unchanged` keys the
//! write on the `expires_at` the refresher read so only one of them lands.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderbridge_core::ConnectionRepository;
use orderbridge_domain::{ExternalConnection, Result as DomainResult};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};
use super::sql::{parsed_at, ts, ts_at, uuid_at, with_connection};

pub struct SqliteConnectionRepository {
    db: Arc<DbManager>,
}

impl SqliteConnectionRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn find_where(
        &self,
        column: &'static str,
        value: String,
    ) -> DomainResult<Option<ExternalConnection>> {
        with_connection(&self.db, move |conn| {
            let sql = format!("{CONNECTION_SELECT_SQL} WHERE {column} = ?1 LIMIT 1");
            conn.query_row(&sql, params![value], map_connection_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }
}

#[async_trait]
impl ConnectionRepository for SqliteConnectionRepository {
    async fn find(&self, org_id: Uuid) -> DomainResult<Option<ExternalConnection>> {
        self.find_where("org_id", org_id.to_string()).await
    }

    async fn find_by_tenant(&self, tenant_id: &str) -> DomainResult<Option<ExternalConnection>> {
        self.find_where("tenant_id", tenant_id.to_owned()).await
    }

    async fn upsert(&self, connection: &ExternalConnection) -> DomainResult<()> {
        let connection = connection.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                CONNECTION_UPSERT_SQL,
                params![
                    connection.org_id.to_string(),
                    connection.tenant_id,
                    connection.access_token,
                    connection.refresh_token,
                    ts(connection.expires_at),
                    connection.region.as_str(),
                    connection.scope,
                    ts(connection.updated_at),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn replace_if_unchanged(
        &self,
        connection: &ExternalConnection,
        previous_expires_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let connection = connection.clone();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE external_connections
                     SET access_token = ?1, refresh_token = ?2, expires_at = ?3, scope = ?4, updated_at = ?5
                     WHERE org_id = ?6 AND expires_at = ?7",
                    params![
                        connection.access_token,
                        connection.refresh_token,
                        ts(connection.expires_at),
                        connection.scope,
                        ts(connection.updated_at),
                        connection.org_id.to_string(),
                        ts(previous_expires_at),
                    ],
                )
                .map_err(map_sql_error)?;
            Ok(changed > 0)
        })
        .await
    }
}

const CONNECTION_SELECT_SQL: &str = "SELECT
        org_id, tenant_id, access_token, refresh_token, expires_at, region, scope, updated_at
    FROM external_connections";

const CONNECTION_UPSERT_SQL: &str = "INSERT INTO external_connections (
        org_id, tenant_id, access_token, refresh_token, expires_at, region, scope, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(org_id) DO UPDATE SET
        tenant_id = excluded.tenant_id,
        access_token = excluded.access_token,
        refresh_token = excluded.refresh_token,
        expires_at = excluded.expires_at,
        region = excluded.region,
        scope = excluded.scope,
        updated_at = excluded.updated_at";

fn map_connection_row(row: &Row<'_>) -> rusqlite::Result<ExternalConnection> {
    Ok(ExternalConnection {
        org_id: uuid_at(row, 0)?,
        tenant_id: row.get(1)?,
        access_token: row.get(2)?,
        refresh_token: row.get(3)?,
        expires_at: ts_at(row, 4)?,
        region: parsed_at(row, 5)?,
        scope: row.get(6)?,
        updated_at: ts_at(row, 7)?,
    })
}
