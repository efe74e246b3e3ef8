//! Hosted payment page client.

use std::time::Duration;

use async_trait::async_trait;
use orderbridge_core::PaymentGateway;
use orderbridge_domain::{CommerceError, GatewayConfig, PaymentRequest, PaymentSession, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use url::Url;

use super::signing::GatewaySigner;
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct SessionReply {
    redirect_url: Option<String>,
    tran_ref: Option<String>,
    code: Option<Value>,
    message: Option<String>,
}

pub struct GatewayClient {
    http: HttpClient,
    base_url: String,
    store_id: String,
    server_key: String,
    signer: GatewaySigner,
    public_base_url: String,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig, public_base_url: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .max_attempts(1)
            .build()?;
        Ok(Self::with_http(config, public_base_url, http))
    }

    pub fn with_http(config: &GatewayConfig, public_base_url: &str, http: HttpClient) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            store_id: config.store_id.clone(),
            server_key: config.server_key.clone(),
            signer: GatewaySigner::new(&config.store_id, &config.signing_secret),
            public_base_url: public_base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn signer(&self) -> &GatewaySigner {
        &self.signer
    }

    fn return_url(&self, status: &str, request: &PaymentRequest) -> Result<String> {
        let mut url = Url::parse(&format!("{}/payments/return", self.public_base_url))
            .map_err(|e| CommerceError::Config(format!("invalid public base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("status", status)
            .append_pair("orderId", &request.order_id.to_string())
            .append_pair("tranRef", &request.tran_ref);
        Ok(url.into())
    }

    fn request_body(&self, request: &PaymentRequest) -> Result<Value> {
        let mut customer = json!({
            "name": request.customer.name,
            "email": request.customer.email,
        });
        if let Some(phone) = &request.customer.phone {
            customer["phone"] = json!(phone);
        }
        Ok(json!({
            "store_id": self.store_id,
            "tran_ref": request.tran_ref,
            "cart_id": request.order_number,
            "description": request.description,
            "amount_minor": request.amount_minor,
            "currency": request.currency,
            "customer": customer,
            "return_urls": {
                "success": self.return_url("success", request)?,
                "decline": self.return_url("decline", request)?,
                "cancel": self.return_url("cancel", request)?,
            },
            "callback_url": format!("{}/payments/webhook", self.public_base_url),
            "signature": self.signer.sign(&request.tran_ref, request.amount_minor, &request.currency),
        }))
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentSession> {
        let body = self.request_body(request)?;
        let builder = self
            .http
            .request(Method::POST, format!("{}/payment/request", self.base_url))
            .header(reqwest::header::AUTHORIZATION, &self.server_key)
            .json(&body);

        let response = self.http.send(builder).await.map_err(|err| {
            CommerceError::gateway(format!("payment request failed: {err}"), err.status_code())
        })?;
        let status = response.status();
        let reply: Option<SessionReply> = response.json().await.ok();

        let rejected = reply.as_ref().and_then(|r| r.code.as_ref()).is_some_and(|code| match code {
            Value::Number(n) => n.as_i64() != Some(0),
            Value::String(s) => !s.is_empty() && s != "0",
            _ => false,
        });
        if !status.is_success() || rejected {
            let message = reply
                .and_then(|r| r.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_owned());
            warn!(
                tran_ref = %request.tran_ref,
                status = status.as_u16(),
                message,
                "gateway refused payment session"
            );
            return Err(CommerceError::gateway(message, Some(status.as_u16())));
        }

        let reply = reply.ok_or_else(|| {
            CommerceError::gateway("gateway reply is not JSON", Some(status.as_u16()))
        })?;
        let payment_url = reply.redirect_url.filter(|u| !u.is_empty()).ok_or_else(|| {
            CommerceError::gateway("gateway reply has no redirect_url", Some(status.as_u16()))
        })?;
        let tran_ref = reply
            .tran_ref
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| request.tran_ref.clone());

        info!(order_id = %request.order_id, tran_ref, "payment session opened");
        Ok(PaymentSession { payment_url, tran_ref })
    }
}
