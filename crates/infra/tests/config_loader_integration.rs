//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;
use std::path::PathBuf;

use orderbridge_domain::{CommerceError, ErpRegion};
use orderbridge_infra::config;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create config file");
    file.write_all(contents.as_bytes()).expect("write config file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(
        &dir,
        "orderbridge.json",
        r#"{
            "database": { "path": "/tmp/orderbridge-it.db", "pool_size": 10 },
            "payments": { "public_base_url": "https://shop.example.com" },
            "gateway": {
                "base_url": "https://pay.example.com",
                "store_id": "store-9",
                "server_key": "sk",
                "signing_secret": "whsec",
                "reject_invalid_signatures": false
            },
            "erp": {
                "client_id": "cid",
                "client_secret": "csecret",
                "redirect_uri": "https://shop.example.com/erp/oauth/callback",
                "default_region": "eu"
            }
        }"#,
    );

    let config = config::load_from_file(Some(path)).expect("config from json");

    assert_eq!(config.database.path, "/tmp/orderbridge-it.db");
    assert_eq!(config.database.pool_size, 10);
    assert_eq!(config.payments.public_base_url, "https://shop.example.com");
    assert_eq!(config.gateway.store_id, "store-9");
    assert!(!config.gateway.reject_invalid_signatures);
    assert_eq!(config.erp.default_region, ErpRegion::Eu);
    // omitted sections and fields fall back to defaults
    assert_eq!(config.erp.timeout_secs, config.gateway.timeout_secs);
    assert!(config.quotations.request_estimate_on_create);
    assert_eq!(config.sync.queue_capacity, 256);
}

#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(
        &dir,
        "orderbridge.toml",
        r#"
[server]
bind_address = "127.0.0.1:9000"
log_json = true

[database]
path = "/tmp/orderbridge-toml.db"
pool_size = 4

[quotations]
request_estimate_on_create = false
convert_estimate_on_approval = true

[sync]
batch_size = 50
max_concurrent = 2
queue_capacity = 32
job_timeout_secs = 30
"#,
    );

    let config = config::load_from_file(Some(path)).expect("config from toml");

    assert_eq!(config.server.bind_address, "127.0.0.1:9000");
    assert!(config.server.log_json);
    assert_eq!(config.database.pool_size, 4);
    assert!(!config.quotations.request_estimate_on_create);
    assert!(config.quotations.convert_estimate_on_approval);
    assert_eq!(config.sync.batch_size, 50);
    assert_eq!(config.sync.job_timeout_secs, 30);
    assert!(config.gateway.reject_invalid_signatures);
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(Some("/nonexistent/path/config.json".into()));

    match result {
        Err(CommerceError::Config(msg)) => {
            assert!(msg.contains("not found"), "Error message should mention 'not found'");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_with_invalid_format() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(&dir, "broken.json", r#"{ "this is": "not valid" "#);

    match config::load_from_file(Some(path)) {
        Err(CommerceError::Config(msg)) => {
            assert!(msg.contains("Invalid JSON"), "Error message should mention invalid JSON");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_with_unsupported_extension() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(&dir, "config.yaml", "database: {}");

    assert!(matches!(config::load_from_file(Some(path)), Err(CommerceError::Config(_))));
}
