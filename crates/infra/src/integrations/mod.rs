//! Third-party integrations: the ERP and the payment gateway.

pub mod erp;
pub mod gateway;

pub use erp::{
    parse_erp_event, verify_erp_signature, ErpClient, ErpOAuthClient, ErpTokenManager, RegionTable,
    ERP_SIGNATURE_HEADER,
};
pub use gateway::{parse_callback, GatewayClient, GatewaySigner};
