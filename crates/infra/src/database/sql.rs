//! Column encoding shared by the SQLite repositories.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use orderbridge_domain::Result;
use rusqlite::types::Type;
use rusqlite::{Row, ToSql};
use tokio::task;
use uuid::Uuid;

use super::manager::{DbManager, SqliteConnection};
use crate::errors::map_join_error;

/// Run `f` with a pooled connection on the blocking thread pool.
pub(crate) async fn with_connection<T, F>(db: &Arc<DbManager>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    task::spawn_blocking(move || {
        let mut conn = db.get_connection()?;
        f(&mut conn)
    })
    .await
    .map_err(map_join_error)?
}

pub(crate) fn ts(value: DateTime<Utc>) -> i64 {
    value.timestamp_micros()
}

pub(crate) fn opt_ts(value: Option<DateTime<Utc>>) -> Option<i64> {
    value.map(ts)
}

pub(crate) fn opt_uuid(value: Option<Uuid>) -> Option<String> {
    value.map(|id| id.to_string())
}

fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, message.into())
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e.to_string()))
}

pub(crate) fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e.to_string())))
        .transpose()
}

pub(crate) fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| conversion_error(idx, Type::Integer, format!("timestamp out of range: {micros}")))
}

pub(crate) fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let micros: Option<i64> = row.get(idx)?;
    micros
        .map(|micros| {
            DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
                conversion_error(idx, Type::Integer, format!("timestamp out of range: {micros}"))
            })
        })
        .transpose()
}

/// Parse a lowercase status column through the enum's `FromStr`.
pub(crate) fn parsed_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, Type::Text, e))
}

/// `?2, ?3, ...` placeholders for an `IN (..)` list starting at `first`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

/// Box owned values so they can be bound as a dynamic parameter list.
pub(crate) fn boxed<T: ToSql + Send + 'static>(value: T) -> Box<dyn ToSql + Send> {
    Box::new(value)
}

pub(crate) fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
