//! # orderbridge domain
//!
//! Business types for the commerce back office.
//!
//! This crate contains:
//! - Quotation, order, invoice, catalog and ERP connection types
//! - Lifecycle status enums and their transition rules
//! - The shared error taxonomy and `Result` alias
//! - Configuration structures and domain constants
//!
//! ## Architecture
//! - No dependencies on other orderbridge crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
