//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment when one exists
//! 2. Attempts to load from `ORDERBRIDGE_*` environment variables
//! 3. If a required variable is missing, falls back to loading from file
//! 4. Probes multiple paths for config files (JSON and TOML)
//!
//! ## Environment Variables
//! Required for the environment source:
//! - `ORDERBRIDGE_DB_PATH`: SQLite database file path
//! - `ORDERBRIDGE_PUBLIC_BASE_URL`: public origin used for return/callback URLs
//!
//! Optional (defaults from [`AppConfig::default`]):
//! - `ORDERBRIDGE_BIND_ADDRESS`, `ORDERBRIDGE_LOG_JSON`, `ORDERBRIDGE_DB_POOL_SIZE`
//! - `ORDERBRIDGE_GATEWAY_BASE_URL`, `ORDERBRIDGE_GATEWAY_STORE_ID`,
//!   `ORDERBRIDGE_GATEWAY_SERVER_KEY`, `ORDERBRIDGE_GATEWAY_SIGNING_SECRET`,
//!   `ORDERBRIDGE_GATEWAY_REJECT_INVALID_SIGNATURES`, `ORDERBRIDGE_GATEWAY_TIMEOUT_SECS`
//! - `ORDERBRIDGE_ERP_CLIENT_ID`, `ORDERBRIDGE_ERP_CLIENT_SECRET`,
//!   `ORDERBRIDGE_ERP_REDIRECT_URI`, `ORDERBRIDGE_ERP_SCOPE`,
//!   `ORDERBRIDGE_ERP_WEBHOOK_SECRET`, `ORDERBRIDGE_ERP_DEFAULT_REGION`,
//!   `ORDERBRIDGE_ERP_ACCOUNTS_URL`, `ORDERBRIDGE_ERP_API_URL`,
//!   `ORDERBRIDGE_ERP_CATALOG_CURRENCY`, `ORDERBRIDGE_ERP_TIMEOUT_SECS`
//! - `ORDERBRIDGE_REQUEST_ESTIMATE_ON_CREATE`, `ORDERBRIDGE_CONVERT_ESTIMATE_ON_APPROVAL`
//! - `ORDERBRIDGE_SYNC_BATCH_SIZE`, `ORDERBRIDGE_SYNC_MAX_CONCURRENT`,
//!   `ORDERBRIDGE_SYNC_QUEUE_CAPACITY`, `ORDERBRIDGE_SYNC_JOB_TIMEOUT_SECS`
//!
//! ## File Locations
//! The loader looks for `config.{json,toml}` and `orderbridge.{json,toml}` in
//! the working directory, its two parents, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use orderbridge_domain::{
    AppConfig, CommerceError, DatabaseConfig, ErpConfig, ErpRegion, GatewayConfig,
    PaymentsConfig, QuotationConfig, Result, ServerConfig, SyncConfig,
};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["config.json", "config.toml", "orderbridge.json", "orderbridge.toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `CommerceError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value cannot be parsed
pub fn load() -> Result<AppConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `CommerceError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<AppConfig> {
    let database_path = env_var("ORDERBRIDGE_DB_PATH")?;
    let public_base_url = env_var("ORDERBRIDGE_PUBLIC_BASE_URL")?;

    let server_defaults = ServerConfig::default();
    let server = ServerConfig {
        bind_address: env_opt("ORDERBRIDGE_BIND_ADDRESS")
            .unwrap_or(server_defaults.bind_address),
        log_json: env_bool("ORDERBRIDGE_LOG_JSON", server_defaults.log_json),
    };

    let database = DatabaseConfig {
        path: database_path,
        pool_size: env_parse("ORDERBRIDGE_DB_POOL_SIZE", DatabaseConfig::default().pool_size)?,
    };

    let gateway_defaults = GatewayConfig::default();
    let gateway = GatewayConfig {
        base_url: env_opt("ORDERBRIDGE_GATEWAY_BASE_URL").unwrap_or(gateway_defaults.base_url),
        store_id: env_opt("ORDERBRIDGE_GATEWAY_STORE_ID").unwrap_or_default(),
        server_key: env_opt("ORDERBRIDGE_GATEWAY_SERVER_KEY").unwrap_or_default(),
        signing_secret: env_opt("ORDERBRIDGE_GATEWAY_SIGNING_SECRET").unwrap_or_default(),
        reject_invalid_signatures: env_bool(
            "ORDERBRIDGE_GATEWAY_REJECT_INVALID_SIGNATURES",
            gateway_defaults.reject_invalid_signatures,
        ),
        timeout_secs: env_parse("ORDERBRIDGE_GATEWAY_TIMEOUT_SECS", gateway_defaults.timeout_secs)?,
    };

    let erp_defaults = ErpConfig::default();
    let erp = ErpConfig {
        client_id: env_opt("ORDERBRIDGE_ERP_CLIENT_ID").unwrap_or_default(),
        client_secret: env_opt("ORDERBRIDGE_ERP_CLIENT_SECRET").unwrap_or_default(),
        redirect_uri: env_opt("ORDERBRIDGE_ERP_REDIRECT_URI").unwrap_or(erp_defaults.redirect_uri),
        scope: env_opt("ORDERBRIDGE_ERP_SCOPE").unwrap_or(erp_defaults.scope),
        webhook_secret: env_opt("ORDERBRIDGE_ERP_WEBHOOK_SECRET"),
        default_region: env_parse::<ErpRegion>(
            "ORDERBRIDGE_ERP_DEFAULT_REGION",
            erp_defaults.default_region,
        )?,
        accounts_url_override: env_opt("ORDERBRIDGE_ERP_ACCOUNTS_URL"),
        api_url_override: env_opt("ORDERBRIDGE_ERP_API_URL"),
        catalog_currency: env_opt("ORDERBRIDGE_ERP_CATALOG_CURRENCY")
            .unwrap_or(erp_defaults.catalog_currency),
        timeout_secs: env_parse("ORDERBRIDGE_ERP_TIMEOUT_SECS", erp_defaults.timeout_secs)?,
    };

    let quotation_defaults = QuotationConfig::default();
    let quotations = QuotationConfig {
        request_estimate_on_create: env_bool(
            "ORDERBRIDGE_REQUEST_ESTIMATE_ON_CREATE",
            quotation_defaults.request_estimate_on_create,
        ),
        convert_estimate_on_approval: env_bool(
            "ORDERBRIDGE_CONVERT_ESTIMATE_ON_APPROVAL",
            quotation_defaults.convert_estimate_on_approval,
        ),
    };

    let sync_defaults = SyncConfig::default();
    let sync = SyncConfig {
        batch_size: env_parse("ORDERBRIDGE_SYNC_BATCH_SIZE", sync_defaults.batch_size)?,
        max_concurrent: env_parse("ORDERBRIDGE_SYNC_MAX_CONCURRENT", sync_defaults.max_concurrent)?,
        queue_capacity: env_parse("ORDERBRIDGE_SYNC_QUEUE_CAPACITY", sync_defaults.queue_capacity)?,
        job_timeout_secs: env_parse(
            "ORDERBRIDGE_SYNC_JOB_TIMEOUT_SECS",
            sync_defaults.job_timeout_secs,
        )?,
    };

    Ok(AppConfig {
        server,
        database,
        payments: PaymentsConfig { public_base_url },
        gateway,
        erp,
        quotations,
        sync,
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, searches several locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CommerceError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommerceError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            CommerceError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CommerceError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, format chosen by extension.
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CommerceError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CommerceError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CommerceError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_path() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join("..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `CommerceError::Config` if the variable is not set or empty.
pub fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        CommerceError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Non-empty environment variable, if set.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// Returns `default` when the variable is not set.
pub fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Parse an optional environment variable, falling back to `default`.
///
/// # Errors
/// Returns `CommerceError::Config` when the variable is set but invalid.
pub fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| CommerceError::Config(format!("Invalid value for {key}: {e}"))),
        None => Ok(default),
    }
}
