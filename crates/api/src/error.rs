//! Mapping domain errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orderbridge_domain::CommerceError;
use serde_json::json;

use crate::utils::logging::error_label;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub CommerceError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CommerceError::Validation(_) => StatusCode::BAD_REQUEST,
            CommerceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CommerceError::NotFound(_) => StatusCode::NOT_FOUND,
            CommerceError::Conflict(_) | CommerceError::AlreadyConverted(_) => StatusCode::CONFLICT,
            CommerceError::InvalidStateTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CommerceError::Gateway { .. } | CommerceError::ExternalApi { .. } => {
                StatusCode::BAD_GATEWAY
            }
            CommerceError::Database(_) | CommerceError::Config(_) | CommerceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<CommerceError> for ApiError {
    fn from(value: CommerceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let label = error_label(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, label, "request failed");
        } else {
            tracing::debug!(error = %self.0, label, "request rejected");
        }

        // internal details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal error".to_owned()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({ "error": label, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (CommerceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CommerceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (CommerceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CommerceError::AlreadyConverted("x".into()), StatusCode::CONFLICT),
            (CommerceError::Conflict("x".into()), StatusCode::CONFLICT),
            (CommerceError::invalid_transition("a", "b"), StatusCode::UNPROCESSABLE_ENTITY),
            (CommerceError::gateway("x", Some(500)), StatusCode::BAD_GATEWAY),
            (CommerceError::external_api("x", None), StatusCode::BAD_GATEWAY),
            (CommerceError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
