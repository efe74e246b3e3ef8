use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy shared by every orderbridge crate.
///
/// Domain services return these directly; adapters translate their own
/// failures (SQLite, HTTP, gateway/ERP replies) into one of the variants
/// before crossing a port boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum CommerceError {
    /// Bad input or unmet precondition the caller can correct.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal lifecycle move.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Re-conversion of a quotation that already produced an order.
    #[error("Already converted: {0}")]
    AlreadyConverted(String),

    /// Duplicate row or lost a conditional write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gateway error: {message}")]
    Gateway { message: String, status_code: Option<u16> },

    #[error("External API error: {message}")]
    ExternalApi { message: String, status_code: Option<u16> },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommerceError {
    /// Build an [`CommerceError::InvalidStateTransition`] from any two
    /// displayable states.
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition { from: from.to_string(), to: to.to_string() }
    }

    pub fn external_api(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::ExternalApi { message: message.into(), status_code }
    }

    pub fn gateway(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Gateway { message: message.into(), status_code }
    }

    /// True for both duplicate-style variants.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::AlreadyConverted(_))
    }

    /// HTTP status carried by third-party failures, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Gateway { status_code, .. } | Self::ExternalApi { status_code, .. } => {
                *status_code
            }
            _ => None,
        }
    }

    /// Whether the failure came from a system outside our control.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Gateway { .. } | Self::ExternalApi { .. })
    }
}

pub type Result<T> = std::result::Result<T, CommerceError>;
