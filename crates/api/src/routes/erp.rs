//! ERP OAuth connect flow, catalog sync trigger and inbound webhook.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use orderbridge_core::{CatalogSyncOptions, CatalogSyncReport};
use orderbridge_domain::{CommerceError, ErpEvent, SignatureCheck};
use orderbridge_infra::{parse_erp_event, verify_erp_signature, ERP_SIGNATURE_HEADER};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::context::AppContext;
use crate::error::ApiResult;
use crate::session::Session;
use crate::utils::logging::error_label;

const INTEGRATIONS_PAGE: &str = "/settings/integrations";

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub location: Option<String>,
}

/// `GET /erp/oauth/authorize`
pub async fn authorize(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
) -> ApiResult<Redirect> {
    let url = ctx.erp_tokens.oauth().authorization_url(session.org_id)?;
    info!(org_id = %session.org_id, user_id = %session.user_id, "starting ERP authorization");
    Ok(Redirect::to(&url))
}

/// Short code shown on the integrations page when connecting fails.
fn connect_error_code(err: &CommerceError) -> &'static str {
    match err {
        CommerceError::Unauthorized(_) => "invalid_state",
        CommerceError::Validation(msg) if msg.starts_with("unsupported_region") => {
            "unsupported_region"
        }
        CommerceError::ExternalApi { .. } => "token_exchange_failed",
        CommerceError::Config(_) => "tenant_unresolved",
        _ => "internal",
    }
}

fn integrations_error(code: &str) -> Redirect {
    let code = url::form_urlencoded::byte_serialize(code.as_bytes()).collect::<String>();
    Redirect::to(&format!("{INTEGRATIONS_PAGE}?erp=error&code={code}"))
}

/// `GET /erp/oauth/callback`
pub async fn oauth_callback(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Redirect {
    if let Some(error) = query.error.as_deref().filter(|e| !e.trim().is_empty()) {
        warn!(error, "ERP authorization denied");
        return integrations_error(error);
    }
    let (Some(code), Some(state)) = (query.code.as_deref(), query.state.as_deref()) else {
        warn!("ERP callback without code or state");
        return integrations_error("missing_parameters");
    };

    match ctx.erp_tokens.connect(state, code, query.location.as_deref()).await {
        Ok(connection) => {
            info!(
                org_id = %connection.org_id,
                region = %connection.region,
                tenant_id = ?connection.tenant_id,
                "ERP connected"
            );
            Redirect::to(&format!("{INTEGRATIONS_PAGE}?erp=connected"))
        }
        Err(err) => {
            warn!(error = %err, label = error_label(&err), "ERP connect failed");
            integrations_error(connect_error_code(&err))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogSyncRequest {
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub transactional: bool,
}

/// `POST /erp/catalog/sync`
pub async fn sync_catalog(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
    body: Bytes,
) -> ApiResult<Json<CatalogSyncReport>> {
    let request: CatalogSyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CatalogSyncRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| CommerceError::Validation(format!("invalid sync request: {e}")))?
    };
    let options = CatalogSyncOptions {
        org_id: session.org_id,
        batch_size: request.batch_size,
        max_concurrent: request.max_concurrent,
        transactional: request.transactional,
    };
    let report = ctx.erp_sync.sync_catalog(options).await?;
    info!(
        org_id = %session.org_id,
        synced = report.synced,
        errors = report.errors,
        "catalog sync requested"
    );
    Ok(Json(report))
}

/// `POST /erp/webhook`
///
/// Every delivery is audited, including rejected ones. Processing errors
/// answer 200 so the ERP does not retry a payload that cannot succeed.
pub async fn erp_webhook(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let provided = headers.get(ERP_SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let signature =
        verify_erp_signature(ctx.config.erp.webhook_secret.as_deref(), &body, provided);

    let payload: Value = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    let event_type = payload
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .trim()
        .to_ascii_lowercase();

    let event = match parse_erp_event(&body) {
        Ok(event) => event,
        // still audited so the rejection is visible
        Err(_) if signature == SignatureCheck::Invalid => {
            ErpEvent::Unhandled { event_type: event_type.clone() }
        }
        Err(err) => {
            warn!(error = %err, "malformed ERP webhook");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "malformed payload" })))
                .into_response();
        }
    };

    match ctx.erp_events.dispatch(&event_type, event, payload, signature).await {
        Ok(outcome) => {
            (StatusCode::OK, Json(json!({ "received": true, "outcome": outcome }))).into_response()
        }
        Err(CommerceError::Unauthorized(_)) => {
            (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid signature" })))
                .into_response()
        }
        Err(err) => (
            StatusCode::OK,
            Json(json!({ "received": true, "error": error_label(&err) })),
        )
            .into_response(),
    }
}
