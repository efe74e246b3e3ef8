//! # orderbridge infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - SQLite repositories behind an r2d2 pool
//! - The retrying HTTP client
//! - ERP (OAuth, tokens, regions, REST) and payment gateway adapters
//! - The supervised background sync worker
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `orderbridge-core`
//! - Depends on `orderbridge-domain`, `orderbridge-common` and `orderbridge-core`
//! - Contains all "impure" code (I/O, clocks, network)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod sync;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use http::*;
pub use integrations::*;
