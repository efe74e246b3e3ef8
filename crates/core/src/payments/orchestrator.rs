//! Payment orchestration.
//!
//! Orders carry the quotation they came from, so a paid callback converts
//! exactly that quotation. Every status write is conditional on the status
//! read, which is what makes repeated gateway callbacks harmless: only the
//! invocation whose write lands performs the downstream side effects.

use std::sync::Arc;

use orderbridge_common::Clock;
use orderbridge_domain::constants::{
    EVENT_PAYMENT_CALLBACK, EVENT_PAYMENT_RETURN, ORDER_NUMBER_PREFIX, PAY_LATER_TRAN_REF_PREFIX,
    TRAN_REF_PREFIX,
};
use orderbridge_domain::{
    CommerceError, CustomerDetails, NormalizedCallback, Order, OrderStatus, PaymentInitiated,
    PaymentOption, PaymentOutcome, PaymentRequest, Quotation, QuotationStatus, Result,
    WebhookEvent, WebhookSource,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::ports::{PaymentGateway, WebhookEventRepository};
use crate::lifecycle::numbering::{document_number, transaction_ref};
use crate::lifecycle::ports::{OrderRepository, QuotationRepository};
use crate::lifecycle::service::{ensure_convertible, explain_conversion_failure};
use crate::sync::ports::SyncJobSink;
use crate::sync::SyncJob;

/// Request to settle a quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationPayment {
    pub quotation_id: Uuid,
    pub option: PaymentOption,
    pub customer: CustomerDetails,
}

/// What a callback invocation did to its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum CallbackDisposition {
    /// This invocation moved the order and ran the side effects.
    Applied,
    /// The order already had this outcome; nothing was repeated.
    AlreadyApplied,
    /// The order already carries a different outcome and was left alone.
    Conflicting { current: OrderStatus },
    /// The status code belongs to no known family.
    Unrecognized { code: String },
    /// The callback settles a different amount or currency than the order.
    AmountMismatch { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackOutcome {
    pub order_id: Uuid,
    pub status: OrderStatus,
    #[serde(flatten)]
    pub disposition: CallbackDisposition,
}

pub struct PaymentOrchestrator {
    quotations: Arc<dyn QuotationRepository>,
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn WebhookEventRepository>,
    gateway: Arc<dyn PaymentGateway>,
    sync: Arc<dyn SyncJobSink>,
    clock: Arc<dyn Clock>,
    public_base_url: String,
}

impl PaymentOrchestrator {
    pub fn new(
        quotations: Arc<dyn QuotationRepository>,
        orders: Arc<dyn OrderRepository>,
        events: Arc<dyn WebhookEventRepository>,
        gateway: Arc<dyn PaymentGateway>,
        sync: Arc<dyn SyncJobSink>,
        clock: Arc<dyn Clock>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            quotations,
            orders,
            events,
            gateway,
            sync,
            clock,
            public_base_url: public_base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order> {
        self.orders
            .find(id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("order {id}")))
    }

    /// Order behind a gateway transaction reference, read without
    /// reconciling anything.
    pub async fn order_for_tran_ref(&self, tran_ref: &str) -> Result<Order> {
        self.orders
            .find_by_tran_ref(tran_ref)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("order with tran_ref {tran_ref}")))
    }

    /// Start paying an approved or sent quotation.
    ///
    /// A quotation has at most one order. An unpaid order left by an earlier
    /// attempt is reused with a fresh transaction reference.
    pub async fn initiate_payment_from_quotation(
        &self,
        request: QuotationPayment,
    ) -> Result<PaymentInitiated> {
        let quotation = self
            .quotations
            .find(request.quotation_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("quotation {}", request.quotation_id)))?;
        ensure_convertible(&quotation)?;

        let tran_ref = match request.option {
            PaymentOption::PayNow => transaction_ref(TRAN_REF_PREFIX),
            PaymentOption::BuyNowPayLater => transaction_ref(PAY_LATER_TRAN_REF_PREFIX),
        };
        let order = self.order_awaiting_payment(&quotation, &tran_ref).await?;

        match request.option {
            PaymentOption::PayNow => self.open_gateway_session(order, tran_ref, request.customer).await,
            PaymentOption::BuyNowPayLater => self.settle_pay_later(order, tran_ref).await,
        }
    }

    /// Start a new payment attempt for an existing unpaid order.
    pub async fn initiate_payment_for_order(
        &self,
        order_id: Uuid,
        customer: CustomerDetails,
    ) -> Result<PaymentInitiated> {
        let order = self.get_order(order_id).await?;
        if !OrderStatus::PAYABLE.contains(&order.status) {
            return Err(CommerceError::invalid_transition(
                order.status,
                OrderStatus::AwaitingPayment,
            ));
        }

        let tran_ref = transaction_ref(TRAN_REF_PREFIX);
        if !self.orders.assign_tran_ref(order.id, &OrderStatus::PAYABLE, &tran_ref).await? {
            return Err(CommerceError::Conflict(format!(
                "order {order_id} changed while starting payment"
            )));
        }
        let order = Order { status: OrderStatus::AwaitingPayment, ..order };
        self.open_gateway_session(order, tran_ref, customer).await
    }

    /// Mark a paid order as refunded.
    pub async fn record_refund(&self, order_id: Uuid) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        if order.status != OrderStatus::Paid {
            return Err(CommerceError::invalid_transition(order.status, OrderStatus::Refunded));
        }
        if !self
            .orders
            .transition_status(order_id, &[OrderStatus::Paid], OrderStatus::Refunded, None)
            .await?
        {
            return Err(CommerceError::Conflict(format!("order {order_id} changed during refund")));
        }
        info!(order_id = %order_id, "order refunded");
        self.get_order(order_id).await
    }

    async fn order_awaiting_payment(&self, quotation: &Quotation, tran_ref: &str) -> Result<Order> {
        if let Some(existing) = self.orders.find_by_quotation(quotation.id).await? {
            if !OrderStatus::PAYABLE.contains(&existing.status) {
                return Err(CommerceError::AlreadyConverted(format!(
                    "quotation {} is settled by order {}",
                    quotation.id, existing.id
                )));
            }
            if !self.orders.assign_tran_ref(existing.id, &OrderStatus::PAYABLE, tran_ref).await? {
                return Err(CommerceError::Conflict(format!(
                    "order {} changed while starting payment",
                    existing.id
                )));
            }
            return Ok(Order {
                status: OrderStatus::AwaitingPayment,
                gateway_tran_ref: Some(tran_ref.to_owned()),
                ..existing
            });
        }

        let now = self.clock.now();
        let order = Order::from_quotation(
            quotation,
            Uuid::now_v7(),
            document_number(ORDER_NUMBER_PREFIX, now),
            OrderStatus::AwaitingPayment,
            Some(tran_ref.to_owned()),
            now,
        );
        if let Err(err) = self.orders.insert_for_quotation(&order, false).await {
            return Err(explain_conversion_failure(self.quotations.as_ref(), quotation.id, err).await);
        }
        info!(
            order_id = %order.id,
            quotation_id = %quotation.id,
            tran_ref,
            "order created for payment"
        );
        Ok(order)
    }

    async fn open_gateway_session(
        &self,
        order: Order,
        tran_ref: String,
        customer: CustomerDetails,
    ) -> Result<PaymentInitiated> {
        let request = PaymentRequest {
            tran_ref: tran_ref.clone(),
            order_id: order.id,
            order_number: order.number.clone(),
            description: format!("Order {}", order.number),
            amount_minor: order.total_cents,
            currency: order.currency.clone(),
            customer,
        };

        let session = match self.gateway.initiate_payment(&request).await {
            Ok(session) => session,
            Err(err) => {
                warn!(order_id = %order.id, tran_ref, error = %err, "payment initiation failed");
                if let Err(mark_err) = self
                    .orders
                    .transition_status(
                        order.id,
                        &[OrderStatus::AwaitingPayment],
                        OrderStatus::Failed,
                        None,
                    )
                    .await
                {
                    warn!(order_id = %order.id, error = %mark_err, "failed to mark order failed");
                }
                return Err(err);
            }
        };

        // Some gateways assign their own reference; callbacks will carry it.
        let effective_ref = if !session.tran_ref.is_empty() && session.tran_ref != tran_ref {
            if !self
                .orders
                .assign_tran_ref(order.id, &[OrderStatus::AwaitingPayment], &session.tran_ref)
                .await?
            {
                return Err(CommerceError::Conflict(format!(
                    "order {} changed while recording gateway reference",
                    order.id
                )));
            }
            session.tran_ref
        } else {
            tran_ref
        };

        info!(order_id = %order.id, tran_ref = %effective_ref, "payment session opened");
        Ok(PaymentInitiated {
            payment_url: session.payment_url,
            order_id: order.id,
            tran_ref: effective_ref,
        })
    }

    async fn settle_pay_later(&self, order: Order, tran_ref: String) -> Result<PaymentInitiated> {
        if !self
            .orders
            .transition_status(
                order.id,
                &[OrderStatus::AwaitingPayment],
                OrderStatus::Paid,
                Some(&tran_ref),
            )
            .await?
        {
            return Err(CommerceError::Conflict(format!(
                "order {} changed before pay-later settlement",
                order.id
            )));
        }
        info!(order_id = %order.id, tran_ref, "order settled with pay later");

        if let Err(err) = self.after_paid(&order).await {
            warn!(order_id = %order.id, error = %err, "pay-later side effects incomplete");
        }

        Ok(PaymentInitiated {
            payment_url: format!(
                "{}/payments/result?status=success&orderId={}",
                self.public_base_url, order.id
            ),
            order_id: order.id,
            tran_ref,
        })
    }

    /// Reconcile a server-to-server gateway callback.
    pub async fn handle_payment_callback(
        &self,
        tran_ref: &str,
        callback: &NormalizedCallback,
    ) -> Result<CallbackOutcome> {
        self.reconcile(EVENT_PAYMENT_CALLBACK, tran_ref, callback).await
    }

    /// Reconcile the browser return redirect. Same rules as the webhook;
    /// callers only pass returns whose signature verified.
    pub async fn handle_payment_return(
        &self,
        tran_ref: &str,
        callback: &NormalizedCallback,
    ) -> Result<CallbackOutcome> {
        self.reconcile(EVENT_PAYMENT_RETURN, tran_ref, callback).await
    }

    /// Audit a callback refused before reconciliation.
    pub async fn record_rejected_callback(
        &self,
        callback: &NormalizedCallback,
        reason: &str,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut event = WebhookEvent::received(
            WebhookSource::Gateway,
            EVENT_PAYMENT_CALLBACK,
            callback_payload(callback),
            now,
        );
        event.correlation_id = callback.tran_ref.clone();
        warn!(tran_ref = ?callback.tran_ref, reason, "payment callback rejected");
        self.events.append(&event.failed(reason, now)).await
    }

    async fn reconcile(
        &self,
        event_type: &str,
        tran_ref: &str,
        callback: &NormalizedCallback,
    ) -> Result<CallbackOutcome> {
        let now = self.clock.now();
        let mut event =
            WebhookEvent::received(WebhookSource::Gateway, event_type, callback_payload(callback), now);
        event.correlation_id = Some(tran_ref.to_owned());

        let order = match self.orders.find_by_tran_ref(tran_ref).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!(tran_ref, "callback for unknown transaction");
                self.audit(event.failed("unknown transaction reference", now)).await;
                return Err(CommerceError::NotFound(format!("order with tran_ref {tran_ref}")));
            }
            Err(err) => {
                self.audit(event.failed(err.to_string(), now)).await;
                return Err(err);
            }
        };
        event.order_id = Some(order.id);

        let Some(outcome) = callback.outcome() else {
            let code = callback.status_code.clone().unwrap_or_default();
            warn!(order_id = %order.id, tran_ref, code, "unrecognized gateway status code");
            self.audit(event.failed(format!("unrecognized status code {code:?}"), now)).await;
            return Ok(CallbackOutcome {
                order_id: order.id,
                status: order.status,
                disposition: CallbackDisposition::Unrecognized { code },
            });
        };

        if let Some(reason) = amount_mismatch(callback, &order) {
            warn!(order_id = %order.id, tran_ref, reason = %reason, "payment callback amount rejected");
            self.audit(event.failed(reason.clone(), now)).await;
            return Ok(CallbackOutcome {
                order_id: order.id,
                status: order.status,
                disposition: CallbackDisposition::AmountMismatch { reason },
            });
        }

        let target = outcome.order_status();
        let moved = match self
            .orders
            .transition_status(
                order.id,
                &[OrderStatus::AwaitingPayment],
                target,
                callback.payment_id.as_deref(),
            )
            .await
        {
            Ok(moved) => moved,
            Err(err) => {
                self.audit(event.failed(err.to_string(), now)).await;
                return Err(err);
            }
        };

        if moved {
            info!(order_id = %order.id, tran_ref, status = %target, "payment callback applied");
            let side_effects = if outcome == PaymentOutcome::Paid {
                self.after_paid(&order).await
            } else {
                Ok(())
            };
            match side_effects {
                Ok(()) => self.audit(event.processed(now)).await,
                Err(err) => {
                    warn!(order_id = %order.id, error = %err, "paid side effects incomplete");
                    self.audit(event.failed(err.to_string(), now)).await;
                }
            }
            return Ok(CallbackOutcome {
                order_id: order.id,
                status: target,
                disposition: CallbackDisposition::Applied,
            });
        }

        let current = match self.orders.find(order.id).await {
            Ok(Some(fresh)) => fresh.status,
            Ok(None) => order.status,
            Err(err) => {
                self.audit(event.failed(err.to_string(), now)).await;
                return Err(err);
            }
        };

        if current == target {
            info!(order_id = %order.id, tran_ref, status = %target, "duplicate payment callback");
            self.audit(event.processed(now)).await;
            Ok(CallbackOutcome {
                order_id: order.id,
                status: current,
                disposition: CallbackDisposition::AlreadyApplied,
            })
        } else {
            warn!(
                order_id = %order.id,
                tran_ref,
                current = %current,
                incoming = %target,
                "conflicting payment callback ignored"
            );
            self.audit(event.failed(format!("conflicting callback: order is {current}"), now))
                .await;
            Ok(CallbackOutcome {
                order_id: order.id,
                status: current,
                disposition: CallbackDisposition::Conflicting { current },
            })
        }
    }

    /// Convert the order's own quotation and queue its ERP documents.
    async fn after_paid(&self, order: &Order) -> Result<()> {
        if let Some(quotation_id) = order.quotation_id {
            let converted = self
                .quotations
                .update_status_if(
                    quotation_id,
                    &QuotationStatus::CONVERTIBLE,
                    QuotationStatus::Converted,
                    Some(&format!("paid by order {}", order.number)),
                )
                .await?;
            if converted {
                info!(quotation_id = %quotation_id, order_id = %order.id, "quotation converted");
            }
        }

        let job = SyncJob::order_documents(order.id, self.clock.now());
        let correlation_id = job.correlation_id;
        self.sync.enqueue(job)?;
        info!(order_id = %order.id, %correlation_id, "order sync queued");
        Ok(())
    }

    async fn audit(&self, event: WebhookEvent) {
        if let Err(err) = self.events.append(&event).await {
            warn!(event_id = %event.id, error = %err, "failed to append webhook event");
        }
    }
}

fn callback_payload(callback: &NormalizedCallback) -> serde_json::Value {
    serde_json::to_value(callback).unwrap_or(serde_json::Value::Null)
}

/// Amount and currency the callback reports, checked against the order.
/// Fields the callback leaves out are not compared.
fn amount_mismatch(callback: &NormalizedCallback, order: &Order) -> Option<String> {
    if let Some(amount) = callback.amount.as_deref() {
        match amount.trim().parse::<i64>() {
            Ok(minor) if minor == order.total_cents => {}
            _ => {
                return Some(format!(
                    "callback amount {amount:?} does not match order total {}",
                    order.total_cents
                ))
            }
        }
    }
    if let Some(currency) = callback.currency.as_deref() {
        if !currency.trim().eq_ignore_ascii_case(&order.currency) {
            return Some(format!(
                "callback currency {currency:?} does not match order currency {}",
                order.currency
            ));
        }
    }
    None
}
