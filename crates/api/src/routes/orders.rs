//! Session-scoped order endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use orderbridge_domain::{CustomerDetails, Order, PaymentInitiated};
use serde::Deserialize;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::ApiResult;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct OrderPaymentRequest {
    pub customer: CustomerDetails,
}

async fn owned_order(ctx: &AppContext, session: &Session, id: Uuid) -> ApiResult<Order> {
    let order = ctx.payments.get_order(id).await?;
    session.ensure_owns(order.org_id, &format!("order {id}"))?;
    Ok(order)
}

/// `GET /orders/{id}`
pub async fn get_order(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    Ok(Json(owned_order(&ctx, &session, id).await?))
}

/// `POST /orders/{id}/payment`
pub async fn initiate_payment(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(request): Json<OrderPaymentRequest>,
) -> ApiResult<Json<PaymentInitiated>> {
    owned_order(&ctx, &session, id).await?;
    Ok(Json(ctx.payments.initiate_payment_for_order(id, request.customer).await?))
}

/// `POST /orders/{id}/refund`
pub async fn record_refund(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    owned_order(&ctx, &session, id).await?;
    Ok(Json(ctx.payments.record_refund(id).await?))
}
