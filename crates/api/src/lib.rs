//! # orderbridge api
//!
//! Composition root and HTTP surface.
//!
//! - [`AppContext`] builds every adapter and service once and injects them
//! - [`router`] exposes the gateway, ERP and session-scoped endpoints
//! - [`utils::logging`] installs the tracing subscriber

pub mod context;
pub mod error;
pub mod routes;
pub mod session;
pub mod utils;

pub use context::AppContext;
pub use routes::router;
