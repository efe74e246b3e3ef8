//! Payment initiation and gateway callback reconciliation.

pub mod orchestrator;
pub mod ports;

pub use orchestrator::{CallbackDisposition, CallbackOutcome, PaymentOrchestrator, QuotationPayment};
