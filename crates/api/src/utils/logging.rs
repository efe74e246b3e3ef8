//! Tracing initialisation and log helpers.

use orderbridge_domain::CommerceError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Convert a `CommerceError` into a stable label suitable for logging and
/// error bodies.
#[inline]
pub fn error_label(error: &CommerceError) -> &'static str {
    match error {
        CommerceError::Validation(_) => "validation",
        CommerceError::NotFound(_) => "not_found",
        CommerceError::InvalidStateTransition { .. } => "invalid_state_transition",
        CommerceError::AlreadyConverted(_) => "already_converted",
        CommerceError::Conflict(_) => "conflict",
        CommerceError::Gateway { .. } => "gateway",
        CommerceError::ExternalApi { .. } => "external_api",
        CommerceError::Unauthorized(_) => "unauthorized",
        CommerceError::Database(_) => "database",
        CommerceError::Config(_) => "config",
        CommerceError::Internal(_) => "internal",
    }
}
