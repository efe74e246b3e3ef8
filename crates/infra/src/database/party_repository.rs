//! Customers and branches, with the ERP contact each is linked to.

use std::sync::Arc;

use async_trait::async_trait;
use orderbridge_core::PartyRepository;
use orderbridge_domain::{Party, Result as DomainResult};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};
use super::sql::{parsed_at, uuid_at, with_connection};

pub struct SqlitePartyRepository {
    db: Arc<DbManager>,
}

impl SqlitePartyRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Register a customer or branch. Parties are owned by the account
    /// system; this is the write path it uses.
    pub async fn insert(&self, party: &Party) -> DomainResult<()> {
        let party = party.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO parties (id, org_id, kind, name, email, phone, external_contact_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    party.id.to_string(),
                    party.org_id.to_string(),
                    party.kind.as_str(),
                    party.name,
                    party.email,
                    party.phone,
                    party.external_contact_id,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl PartyRepository for SqlitePartyRepository {
    async fn find(&self, id: Uuid) -> DomainResult<Option<Party>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT id, org_id, kind, name, email, phone, external_contact_id
                 FROM parties WHERE id = ?1",
                params![id.to_string()],
                map_party_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn link_external_contact(&self, id: Uuid, contact_id: &str) -> DomainResult<()> {
        let contact_id = contact_id.to_owned();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE parties SET external_contact_id = ?1 WHERE id = ?2",
                params![contact_id, id.to_string()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }
}

fn map_party_row(row: &Row<'_>) -> rusqlite::Result<Party> {
    Ok(Party {
        id: uuid_at(row, 0)?,
        org_id: uuid_at(row, 1)?,
        kind: parsed_at(row, 2)?,
        name: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        external_contact_id: row.get(6)?,
    })
}
