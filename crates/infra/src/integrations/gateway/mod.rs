//! Payment gateway integration.

mod callback;
mod client;
mod signing;

pub use callback::parse_callback;
pub use client::GatewayClient;
pub use signing::GatewaySigner;
