//! Session-scoped quotation endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use orderbridge_core::QuotationPayment;
use orderbridge_domain::{
    CustomerDetails, NewQuotation, NewQuotationItem, Order, PaymentInitiated, PaymentOption,
    Quotation, QuotationStatus,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::ApiResult;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    #[serde(default)]
    pub branch_id: Option<Uuid>,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub currency: String,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewQuotationItem>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: QuotationStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuotationPaymentRequest {
    pub option: PaymentOption,
    pub customer: CustomerDetails,
}

async fn owned_quotation(ctx: &AppContext, session: &Session, id: Uuid) -> ApiResult<Quotation> {
    let quotation = ctx.lifecycle.get_quotation(id).await?;
    session.ensure_owns(quotation.org_id, &format!("quotation {id}"))?;
    Ok(quotation)
}

/// `POST /quotations`
pub async fn create_quotation(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
    Json(request): Json<CreateQuotationRequest>,
) -> ApiResult<(StatusCode, Json<Quotation>)> {
    let input = NewQuotation {
        org_id: session.org_id,
        branch_id: request.branch_id,
        customer_id: request.customer_id,
        currency: request.currency,
        valid_until: request.valid_until,
        notes: request.notes,
        items: request.items,
    };
    let quotation = ctx.lifecycle.create_quotation(input).await?;
    info!(quotation_id = %quotation.id, user_id = %session.user_id, "quotation created via api");
    Ok((StatusCode::CREATED, Json(quotation)))
}

/// `GET /quotations/{id}`
pub async fn get_quotation(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Quotation>> {
    Ok(Json(owned_quotation(&ctx, &session, id).await?))
}

/// `POST /quotations/{id}/status`
pub async fn update_status(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<Quotation>> {
    owned_quotation(&ctx, &session, id).await?;
    let quotation =
        ctx.lifecycle.update_status(id, request.status, request.note.as_deref()).await?;
    Ok(Json(quotation))
}

/// `POST /quotations/{id}/convert`
pub async fn convert(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    owned_quotation(&ctx, &session, id).await?;
    let order = ctx.lifecycle.convert_to_order(id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `POST /quotations/{id}/payment`
pub async fn initiate_payment(
    State(ctx): State<Arc<AppContext>>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(request): Json<QuotationPaymentRequest>,
) -> ApiResult<Json<PaymentInitiated>> {
    owned_quotation(&ctx, &session, id).await?;
    let initiated = ctx
        .payments
        .initiate_payment_from_quotation(QuotationPayment {
            quotation_id: id,
            option: request.option,
            customer: request.customer,
        })
        .await?;
    Ok(Json(initiated))
}
