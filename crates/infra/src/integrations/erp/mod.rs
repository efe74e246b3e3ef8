//! ERP integration: OAuth, regional routing, the REST client and webhook
//! decoding.

mod client;
mod errors;
mod oauth;
mod regions;
#[cfg(test)]
mod test_support;
mod tokens;
mod webhook;
mod wire;

pub use client::ErpClient;
pub use errors::{ErpError, ErpErrorCategory};
pub use oauth::{pick_tenant, ErpOAuthClient};
pub use regions::{RegionEndpoints, RegionTable};
pub use tokens::{ErpSession, ErpTokenManager};
pub use webhook::{parse_erp_event, verify_erp_signature, ERP_SIGNATURE_HEADER};
