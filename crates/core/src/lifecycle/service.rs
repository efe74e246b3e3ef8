//! Quotation lifecycle: creation, status moves and conversion to orders.

use std::sync::Arc;

use orderbridge_common::Clock;
use orderbridge_domain::constants::{ORDER_NUMBER_PREFIX, QUOTATION_NUMBER_PREFIX};
use orderbridge_domain::{
    CommerceError, NewQuotation, Order, OrderStatus, Quotation, QuotationConfig, QuotationStatus,
    Result,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::numbering::document_number;
use super::ports::{OrderRepository, QuotationRepository};
use crate::erp::ports::EstimateConverter;
use crate::sync::ports::SyncJobSink;
use crate::sync::{enqueue_best_effort, SyncJob};

const NUMBER_ATTEMPTS: usize = 3;

pub struct QuotationLifecycle {
    quotations: Arc<dyn QuotationRepository>,
    orders: Arc<dyn OrderRepository>,
    sync: Arc<dyn SyncJobSink>,
    clock: Arc<dyn Clock>,
    config: QuotationConfig,
    estimate_converter: Option<Arc<dyn EstimateConverter>>,
}

impl QuotationLifecycle {
    pub fn new(
        quotations: Arc<dyn QuotationRepository>,
        orders: Arc<dyn OrderRepository>,
        sync: Arc<dyn SyncJobSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            quotations,
            orders,
            sync,
            clock,
            config: QuotationConfig::default(),
            estimate_converter: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: QuotationConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable the ERP estimate conversion attempted on approval.
    #[must_use]
    pub fn with_estimate_converter(mut self, converter: Arc<dyn EstimateConverter>) -> Self {
        self.estimate_converter = Some(converter);
        self
    }

    pub async fn get_quotation(&self, id: Uuid) -> Result<Quotation> {
        self.quotations
            .find(id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("quotation {id}")))
    }

    /// Price and persist a draft quotation, then queue its ERP estimate.
    pub async fn create_quotation(&self, input: NewQuotation) -> Result<Quotation> {
        if input.items.is_empty() {
            return Err(CommerceError::Validation("quotation needs at least one item".into()));
        }
        let currency = input.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CommerceError::Validation(format!(
                "currency must be a 3-letter code, got {:?}",
                input.currency
            )));
        }

        let id = Uuid::now_v7();
        let items = input
            .items
            .iter()
            .map(|item| item.priced_for(id))
            .collect::<Result<Vec<_>>>()?;
        let now = self.clock.now();

        let mut quotation = Quotation {
            id,
            org_id: input.org_id,
            branch_id: input.branch_id,
            customer_id: input.customer_id,
            number: String::new(),
            total_cents: Quotation::items_total(&items)?,
            currency,
            status: QuotationStatus::Draft,
            valid_until: input.valid_until,
            notes: input.notes,
            external_estimate_id: None,
            items,
            created_at: now,
            updated_at: now,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            quotation.number = document_number(QUOTATION_NUMBER_PREFIX, now);
            match self.quotations.insert(&quotation).await {
                Ok(()) => break,
                Err(err) if err.is_conflict() && attempt < NUMBER_ATTEMPTS => {
                    warn!(number = %quotation.number, "quotation number taken, regenerating");
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            quotation_id = %quotation.id,
            org_id = %quotation.org_id,
            total_cents = quotation.total_cents,
            "quotation created"
        );

        if self.config.request_estimate_on_create {
            enqueue_best_effort(self.sync.as_ref(), SyncJob::quotation_estimate(quotation.id, now));
        }

        Ok(quotation)
    }

    /// Apply a requested status move.
    ///
    /// Approval may be followed by an ERP estimate conversion; when the ERP
    /// accepts it the quotation ends up converted instead of approved.
    pub async fn update_status(
        &self,
        id: Uuid,
        next: QuotationStatus,
        note: Option<&str>,
    ) -> Result<Quotation> {
        let current = self.get_quotation(id).await?;
        current.status.ensure_transition(next)?;

        let moved = self.quotations.update_status_if(id, &[current.status], next, note).await?;
        if !moved {
            return Err(CommerceError::Conflict(format!(
                "quotation {id} changed while moving from {} to {next}",
                current.status
            )));
        }
        info!(quotation_id = %id, from = %current.status, to = %next, "quotation status updated");

        if next == QuotationStatus::Approved && self.config.convert_estimate_on_approval {
            self.try_convert_estimate(&current).await;
        }

        self.get_quotation(id).await
    }

    async fn try_convert_estimate(&self, quotation: &Quotation) {
        let Some(converter) = &self.estimate_converter else {
            return;
        };

        match converter.convert_estimate(quotation).await {
            Ok(Some(document)) => {
                match self
                    .quotations
                    .update_status_if(
                        quotation.id,
                        &[QuotationStatus::Approved],
                        QuotationStatus::Converted,
                        Some("estimate converted in ERP"),
                    )
                    .await
                {
                    Ok(true) => info!(
                        quotation_id = %quotation.id,
                        sales_order_id = %document.id,
                        "estimate converted on approval"
                    ),
                    Ok(false) => warn!(
                        quotation_id = %quotation.id,
                        "quotation moved before estimate conversion could be recorded"
                    ),
                    Err(err) => warn!(
                        quotation_id = %quotation.id,
                        error = %err,
                        "failed to record estimate conversion"
                    ),
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(quotation_id = %quotation.id, error = %err, "estimate conversion failed");
            }
        }
    }

    /// Create the order for an approved or sent quotation.
    ///
    /// The quotation flips to converted in the same store transaction that
    /// inserts the order, so a second conversion cannot succeed.
    pub async fn convert_to_order(&self, quotation_id: Uuid) -> Result<Order> {
        let quotation = self.get_quotation(quotation_id).await?;
        ensure_convertible(&quotation)?;

        if let Some(existing) = self.orders.find_by_quotation(quotation_id).await? {
            return Err(CommerceError::Conflict(format!(
                "order {} already exists for quotation {quotation_id}",
                existing.id
            )));
        }

        let now = self.clock.now();
        let order = Order::from_quotation(
            &quotation,
            Uuid::now_v7(),
            document_number(ORDER_NUMBER_PREFIX, now),
            OrderStatus::Pending,
            None,
            now,
        );

        if let Err(err) = self.orders.insert_for_quotation(&order, true).await {
            return Err(explain_conversion_failure(self.quotations.as_ref(), quotation_id, err).await);
        }

        info!(
            quotation_id = %quotation_id,
            order_id = %order.id,
            total_cents = order.total_cents,
            "quotation converted to order"
        );
        enqueue_best_effort(self.sync.as_ref(), SyncJob::order_documents(order.id, now));

        Ok(order)
    }

    /// Expire every quotation whose validity has elapsed.
    pub async fn expire_stale_quotations(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut expired = 0_usize;
        for quotation in self.quotations.find_expirable(now).await? {
            if self
                .quotations
                .update_status_if(
                    quotation.id,
                    &QuotationStatus::EXPIRABLE,
                    QuotationStatus::Expired,
                    Some("validity elapsed"),
                )
                .await?
            {
                expired += 1;
            }
        }
        if expired > 0 {
            info!(expired, "expired stale quotations");
        }
        Ok(expired)
    }
}

pub(crate) fn ensure_convertible(quotation: &Quotation) -> Result<()> {
    match quotation.status {
        QuotationStatus::Converted => {
            Err(CommerceError::AlreadyConverted(format!("quotation {}", quotation.id)))
        }
        status if QuotationStatus::CONVERTIBLE.contains(&status) => Ok(()),
        status => Err(CommerceError::Validation(format!(
            "quotation {} must be approved or sent to convert, is {status}",
            quotation.id
        ))),
    }
}

/// Turn a store conflict into `AlreadyConverted` when that is the cause.
pub(crate) async fn explain_conversion_failure(
    quotations: &dyn QuotationRepository,
    quotation_id: Uuid,
    err: CommerceError,
) -> CommerceError {
    if !err.is_conflict() {
        return err;
    }
    match quotations.find(quotation_id).await {
        Ok(Some(q)) if q.status == QuotationStatus::Converted => {
            CommerceError::AlreadyConverted(format!("quotation {quotation_id}"))
        }
        _ => err,
    }
}
