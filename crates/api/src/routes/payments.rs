//! Gateway return redirect and server-to-server webhook.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use orderbridge_domain::{CommerceError, NormalizedCallback, OrderStatus, SignatureCheck};
use orderbridge_infra::parse_callback;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::AppContext;
use crate::utils::logging::error_label;

fn decode_pairs(raw: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

fn value_of<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, value)| key == name && !value.trim().is_empty())
        .map(|(_, value)| value.trim())
}

/// Result page label for an order's status. Orders still awaiting the
/// gateway read as pending.
fn order_status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Paid => "paid",
        OrderStatus::Failed => "failed",
        OrderStatus::Cancelled => "cancelled",
        _ => "pending",
    }
}

fn result_redirect(status: OrderStatus, order_id: Uuid) -> Redirect {
    Redirect::to(&format!(
        "/payments/result?status={}&orderId={order_id}",
        order_status_label(status)
    ))
}

fn error_redirect(err: &CommerceError) -> Redirect {
    Redirect::to(&format!("/payments/error?reason={}", error_label(err)))
}

/// `GET /payments/return`
///
/// The query string comes from the buyer's browser. Only a return whose
/// gateway signature verifies is reconciled; any other return lands on the
/// order's current state. Failures redirect to the error page.
pub async fn payment_return(
    State(ctx): State<Arc<AppContext>>,
    RawQuery(query): RawQuery,
) -> Redirect {
    let pairs = decode_pairs(query.unwrap_or_default().as_bytes());

    let (Some(status), Some(tran_ref), Some(_)) = (
        value_of(&pairs, "status"),
        value_of(&pairs, "tranRef").or_else(|| value_of(&pairs, "tran_ref")),
        value_of(&pairs, "orderId").or_else(|| value_of(&pairs, "order_id")),
    ) else {
        warn!("payment return without status, tranRef or orderId");
        return Redirect::to("/payments/error?reason=missing_parameters");
    };

    let callback = parse_callback(&pairs);
    let signed = callback.tran_ref.as_deref() == Some(tran_ref)
        && ctx.gateway_signer.verify_callback(&callback) == SignatureCheck::Valid;

    if signed {
        return match ctx.payments.handle_payment_return(tran_ref, &callback).await {
            Ok(outcome) => {
                info!(order_id = %outcome.order_id, tran_ref, status = %outcome.status, "payment return reconciled");
                result_redirect(outcome.status, outcome.order_id)
            }
            Err(err) => {
                warn!(tran_ref, error = %err, label = error_label(&err), "payment return reconciliation failed");
                error_redirect(&err)
            }
        };
    }

    warn!(tran_ref, claimed = status, "unsigned payment return; reporting current order state");
    match ctx.payments.order_for_tran_ref(tran_ref).await {
        Ok(order) => result_redirect(order.status, order.id),
        Err(err) => {
            warn!(tran_ref, error = %err, label = error_label(&err), "payment return lookup failed");
            error_redirect(&err)
        }
    }
}

/// `POST /payments/webhook` (form encoded)
pub async fn payment_webhook(State(ctx): State<Arc<AppContext>>, body: Bytes) -> Response {
    let pairs = decode_pairs(&body);
    let callback = parse_callback(&pairs);

    let Some(tran_ref) = callback.tran_ref.clone() else {
        warn!("payment webhook without transaction reference");
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "missing tranRef" })))
            .into_response();
    };

    if let Some(rejection) = check_signature(&ctx, &callback, &tran_ref).await {
        return rejection;
    }

    match ctx.payments.handle_payment_callback(&tran_ref, &callback).await {
        Ok(outcome) => {
            (StatusCode::OK, Json(json!({ "received": true, "outcome": outcome }))).into_response()
        }
        // store trouble is worth a gateway retry
        Err(err @ (CommerceError::Database(_) | CommerceError::Internal(_))) => {
            warn!(tran_ref, error = %err, label = error_label(&err), "payment webhook not processed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "received": false }))).into_response()
        }
        // recorded as a failed event; retrying the same payload cannot help
        Err(err) => {
            warn!(tran_ref, error = %err, label = error_label(&err), "payment webhook dropped");
            (
                StatusCode::OK,
                Json(json!({ "received": true, "error": error_label(&err) })),
            )
                .into_response()
        }
    }
}

async fn check_signature(
    ctx: &AppContext,
    callback: &NormalizedCallback,
    tran_ref: &str,
) -> Option<Response> {
    match ctx.gateway_signer.verify_callback(callback) {
        SignatureCheck::Valid => None,
        SignatureCheck::NotConfigured => {
            warn!(tran_ref, "gateway signing secret not configured; webhook unverified");
            None
        }
        SignatureCheck::Invalid if ctx.config.gateway.reject_invalid_signatures => {
            if let Err(err) = ctx.payments.record_rejected_callback(callback, "invalid signature").await
            {
                warn!(tran_ref, error = %err, "failed to audit rejected callback");
            }
            Some(
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid signature" })))
                    .into_response(),
            )
        }
        SignatureCheck::Invalid => {
            warn!(tran_ref, "payment webhook signature mismatch, processing anyway");
            None
        }
    }
}
