//! ERP error classification
//!
//! Every failed ERP call is classified so callers can decide whether a
//! retry is worthwhile. Outside this module the failure travels as
//! `CommerceError::ExternalApi` with the HTTP status preserved.

use std::fmt;

use orderbridge_domain::CommerceError;
use reqwest::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErpErrorCategory {
    /// Network is offline or the host is unreachable
    NetworkOffline,

    NetworkTimeout,

    /// 5xx replies
    ServerUnavailable,

    /// 401, 403, or a rejected OAuth grant
    Authentication,

    /// 429
    RateLimited,

    /// Remaining 4xx replies and non-zero ERP result codes
    Validation,

    Unknown,
}

impl ErpErrorCategory {
    /// Returns true if this error type should be retried
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::NetworkOffline | Self::NetworkTimeout | Self::ServerUnavailable | Self::RateLimited
        )
    }

    /// Returns recommended retry delay in seconds
    pub fn retry_delay_secs(self) -> Option<u64> {
        match self {
            Self::NetworkOffline => Some(30),
            Self::NetworkTimeout => Some(10),
            Self::ServerUnavailable => Some(60),
            Self::RateLimited => Some(120),
            _ => None,
        }
    }

    /// Short stable label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::NetworkOffline => "network_offline",
            Self::NetworkTimeout => "network_timeout",
            Self::ServerUnavailable => "server_unavailable",
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErpErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkOffline => write!(f, "Network Offline"),
            Self::NetworkTimeout => write!(f, "Network Timeout"),
            Self::ServerUnavailable => write!(f, "Server Unavailable"),
            Self::Authentication => write!(f, "Authentication Failed"),
            Self::RateLimited => write!(f, "Rate Limited"),
            Self::Validation => write!(f, "Validation Error"),
            Self::Unknown => write!(f, "Unknown Error"),
        }
    }
}

/// ERP failure with its category and the HTTP status, when there was one.
#[derive(Debug, Clone)]
pub struct ErpError {
    category: ErpErrorCategory,
    message: String,
    status_code: Option<u16>,
}

impl ErpError {
    pub fn new(category: ErpErrorCategory, message: impl Into<String>) -> Self {
        Self { category, message: message.into(), status_code: None }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn category(&self) -> ErpErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Classify a non-success HTTP reply. `detail` is the ERP's own
    /// message when the body carried one.
    pub fn from_status(status: StatusCode, detail: Option<&str>) -> Self {
        let category = match status.as_u16() {
            401 | 403 => ErpErrorCategory::Authentication,
            429 => ErpErrorCategory::RateLimited,
            400..=499 => ErpErrorCategory::Validation,
            500..=599 => ErpErrorCategory::ServerUnavailable,
            _ => ErpErrorCategory::Unknown,
        };
        let reason = status.canonical_reason().unwrap_or("Unknown");
        let message = match detail {
            Some(detail) => format!("HTTP {} {reason}: {detail}", status.as_u16()),
            None => format!("HTTP {} {reason}", status.as_u16()),
        };
        Self::new(category, message).with_status(status.as_u16())
    }

    /// A 2xx reply whose envelope carried a non-zero result code.
    pub fn from_result_code(code: i64, message: &str, status: StatusCode) -> Self {
        Self::new(ErpErrorCategory::Validation, format!("ERP code {code}: {message}"))
            .with_status(status.as_u16())
    }

    /// Classify a transport-level failure that never produced a response.
    pub fn from_transport(err: &CommerceError) -> Self {
        let message = err.to_string();
        let lowered = message.to_ascii_lowercase();
        let category = if lowered.contains("timed out") || lowered.contains("timeout") {
            ErpErrorCategory::NetworkTimeout
        } else if lowered.contains("connect") || lowered.contains("dns") {
            ErpErrorCategory::NetworkOffline
        } else {
            ErpErrorCategory::Unknown
        };
        Self { category, message, status_code: err.status_code() }
    }
}

impl fmt::Display for ErpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

impl std::error::Error for ErpError {}

impl From<ErpError> for CommerceError {
    fn from(err: ErpError) -> Self {
        CommerceError::external_api(
            format!("ERP {}: {}", err.category.label(), err.message),
            err.status_code,
        )
    }
}
