//! Shared fixtures for the HTTP surface tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use orderbridge_api::{router, AppContext};
use orderbridge_domain::AppConfig;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::MockServer;

pub const STORE_ID: &str = "store-1";
pub const SIGNING_SECRET: &str = "gateway-secret";
pub const ERP_WEBHOOK_SECRET: &str = "erp-secret";

pub struct TestApp {
    pub ctx: Arc<AppContext>,
    pub router: Router,
    pub org_id: Uuid,
    pub gateway: MockServer,
    _temp_dir: TempDir,
}

pub fn test_config(temp_dir: &TempDir, gateway_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.path = temp_dir.path().join("orderbridge.db").display().to_string();
    config.database.pool_size = 4;
    config.payments.public_base_url = "https://shop.example.com".into();
    config.gateway.base_url = gateway_url.to_owned();
    config.gateway.store_id = STORE_ID.into();
    config.gateway.server_key = "server-key".into();
    config.gateway.signing_secret = SIGNING_SECRET.into();
    config.erp.client_id = "erp-client".into();
    config.erp.client_secret = "erp-client-secret".into();
    config.erp.webhook_secret = Some(ERP_WEBHOOK_SECRET.into());
    config.erp.accounts_url_override = Some(format!("{gateway_url}/accounts"));
    config.erp.api_url_override = Some(format!("{gateway_url}/erp"));
    config.quotations.request_estimate_on_create = false;
    config
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let gateway = MockServer::start().await;
        let mut config = test_config(&temp_dir, &gateway.uri());
        adjust(&mut config);

        let ctx = Arc::new(AppContext::new(config).await.expect("app context"));
        Self {
            router: router(Arc::clone(&ctx)),
            ctx,
            org_id: Uuid::now_v7(),
            gateway,
            _temp_dir: temp_dir,
        }
    }

    pub fn session_request(&self, method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-org-id", self.org_id.to_string())
            .header("x-user-id", "user-1")
            .header("x-role", "admin");
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("router response")
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_owned()
}
