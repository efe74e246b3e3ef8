//! Quotation and order lifecycle.

pub mod numbering;
pub mod ports;
pub mod service;

pub use service::QuotationLifecycle;
