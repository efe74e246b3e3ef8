//! Conversions from external infrastructure errors into domain errors.

use orderbridge_domain::CommerceError;
use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CommerceError);

impl From<InfraError> for CommerceError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CommerceError> for InfraError {
    fn from(value: CommerceError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCommerceError {
    fn into_commerce(self) -> CommerceError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CommerceError */
/* -------------------------------------------------------------------------- */

impl IntoCommerceError for SqlError {
    fn into_commerce(self) -> CommerceError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CommerceError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CommerceError::Database("database is locked".into())
                    }
                    // SQLITE_CONSTRAINT_UNIQUE / SQLITE_CONSTRAINT_PRIMARYKEY
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        CommerceError::Conflict(format!("unique constraint violation: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CommerceError::Validation(format!("foreign key constraint violation: {message}"))
                    }
                    _ => CommerceError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CommerceError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CommerceError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CommerceError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => CommerceError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidParameterName(parameter_name) => {
                CommerceError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => CommerceError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => CommerceError::Database("invalid SQL query".into()),
            other => CommerceError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_commerce())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CommerceError */
/* -------------------------------------------------------------------------- */

impl IntoCommerceError for PoolError {
    fn into_commerce(self) -> CommerceError {
        CommerceError::Database(format!("connection pool unavailable: {self}"))
    }
}

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        Self(value.into_commerce())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CommerceError */
/* -------------------------------------------------------------------------- */

impl IntoCommerceError for HttpError {
    fn into_commerce(self) -> CommerceError {
        if self.is_timeout() {
            return CommerceError::external_api("HTTP request timed out", None);
        }

        if self.is_connect() {
            return CommerceError::external_api("HTTP connection failure", None);
        }

        if self.is_decode() {
            return CommerceError::external_api(format!("malformed HTTP response: {self}"), None);
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
            return CommerceError::external_api(message, Some(code));
        }

        CommerceError::external_api(self.to_string(), None)
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_commerce())
    }
}

/// Map a `spawn_blocking` join failure.
pub fn map_join_error(err: tokio::task::JoinError) -> CommerceError {
    CommerceError::Internal(format!("blocking database task failed: {err}"))
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use rusqlite::Error as SqlError;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: CommerceError = InfraError::from(err).into();
        match mapped {
            CommerceError::Database(msg) => {
                assert!(msg.contains("busy") || msg.contains("locked"));
            }
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 2067 },
            Some("UNIQUE constraint failed: orders.quotation_id".into()),
        );

        let mapped: CommerceError = InfraError::from(err).into();
        assert!(mapped.is_conflict(), "{mapped:?}");
        assert!(mapped.to_string().contains("orders.quotation_id"));
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let mapped: CommerceError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn http_status_error_keeps_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(429)).mount(&server).await;

        let response = Client::new().get(server.uri()).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let err = response.error_for_status().unwrap_err();

        let mapped: CommerceError = InfraError::from(err).into();
        assert_eq!(mapped.status_code(), Some(429));
        assert!(mapped.is_external());
    }

    #[tokio::test]
    async fn connection_refused_is_external_without_status() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = Client::new().get(format!("http://{addr}")).send().await.unwrap_err();
        let mapped: CommerceError = InfraError::from(err).into();
        assert!(matches!(mapped, CommerceError::ExternalApi { status_code: None, .. }));
    }
}
