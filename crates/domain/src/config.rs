//! Application configuration structures.
//!
//! Loading (environment, `.env`, TOML/JSON files) lives in the infra crate;
//! these types only describe the shape and defaults.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_CONCURRENT};
use crate::types::ErpRegion;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub erp: ErpConfig,
    #[serde(default)]
    pub quotations: QuotationConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:8080".to_string(), log_json: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "orderbridge.db".to_string(), pool_size: 8 }
    }
}

/// Where buyers are sent back to after payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Public origin of this service, used to build return and callback URLs.
    pub public_base_url: String,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self { public_base_url: "http://localhost:8080".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub store_id: String,
    pub server_key: String,
    pub signing_secret: String,
    /// Refuse webhook deliveries whose signature does not verify.
    #[serde(default = "default_true")]
    pub reject_invalid_signatures: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gateway.invalid".to_string(),
            store_id: String::new(),
            server_key: String::new(),
            signing_secret: String::new(),
            reject_invalid_signatures: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_region")]
    pub default_region: ErpRegion,
    /// Replace every region's OAuth host (self-hosted or test setups).
    #[serde(default)]
    pub accounts_url_override: Option<String>,
    /// Replace every region's API base URL.
    #[serde(default)]
    pub api_url_override: Option<String>,
    /// Currency assigned to catalog rows mirrored from the ERP.
    #[serde(default = "default_currency")]
    pub catalog_currency: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8080/erp/oauth/callback".to_string(),
            scope: default_scope(),
            webhook_secret: None,
            default_region: default_region(),
            accounts_url_override: None,
            api_url_override: None,
            catalog_currency: default_currency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationConfig {
    /// Queue an ERP estimate right after a quotation is created.
    #[serde(default = "default_true")]
    pub request_estimate_on_create: bool,
    /// Ask the ERP to convert the estimate when a quotation is approved.
    #[serde(default)]
    pub convert_estimate_on_approval: bool,
}

impl Default for QuotationConfig {
    fn default() -> Self {
        Self { request_estimate_on_create: true, convert_estimate_on_approval: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub batch_size: usize,
    pub max_concurrent: usize,
    pub queue_capacity: usize,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            queue_capacity: 256,
            job_timeout_secs: default_job_timeout_secs(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_job_timeout_secs() -> u64 {
    120
}

const fn default_region() -> ErpRegion {
    ErpRegion::Us
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_scope() -> String {
    "inventory.fullaccess.all".to_string()
}
