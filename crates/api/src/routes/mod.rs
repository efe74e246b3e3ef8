//! HTTP surface.

mod erp;
mod health;
mod orders;
mod payments;
mod quotations;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

/// Every route, with request tracing.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        // gateway
        .route("/payments/return", get(payments::payment_return))
        .route("/payments/webhook", post(payments::payment_webhook))
        // ERP
        .route("/erp/oauth/authorize", get(erp::authorize))
        .route("/erp/oauth/callback", get(erp::oauth_callback))
        .route("/erp/webhook", post(erp::erp_webhook))
        .route("/erp/catalog/sync", post(erp::sync_catalog))
        // session scoped
        .route("/quotations", post(quotations::create_quotation))
        .route("/quotations/{id}", get(quotations::get_quotation))
        .route("/quotations/{id}/status", post(quotations::update_status))
        .route("/quotations/{id}/convert", post(quotations::convert))
        .route("/quotations/{id}/payment", post(quotations::initiate_payment))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/payment", post(orders::initiate_payment))
        .route("/orders/{id}/refund", post(orders::record_refund))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
