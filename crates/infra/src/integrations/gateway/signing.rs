//! Request signing and callback verification for the payment gateway.
//!
//! The signed message is `store_id|tran_ref|amount_minor|currency`, the MAC
//! is lowercase hex HMAC-SHA256 keyed with the store's signing secret.

use orderbridge_common::{hmac_sha256_hex, verify_hmac_sha256_hex};
use orderbridge_domain::{NormalizedCallback, SignatureCheck};

#[derive(Clone)]
pub struct GatewaySigner {
    store_id: String,
    secret: String,
}

impl std::fmt::Debug for GatewaySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySigner").field("store_id", &self.store_id).finish_non_exhaustive()
    }
}

impl GatewaySigner {
    pub fn new(store_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { store_id: store_id.into(), secret: secret.into() }
    }

    fn message(&self, tran_ref: &str, amount_minor: &str, currency: &str) -> String {
        format!("{}|{tran_ref}|{amount_minor}|{currency}", self.store_id)
    }

    pub fn sign(&self, tran_ref: &str, amount_minor: i64, currency: &str) -> String {
        let message = self.message(tran_ref, &amount_minor.to_string(), currency);
        hmac_sha256_hex(self.secret.as_bytes(), message.as_bytes())
    }

    /// Verify a callback's signature. Any missing field means the callback
    /// is not verified.
    pub fn verify_callback(&self, callback: &NormalizedCallback) -> SignatureCheck {
        if self.secret.is_empty() {
            return SignatureCheck::NotConfigured;
        }
        let (Some(tran_ref), Some(amount), Some(currency), Some(signature)) = (
            callback.tran_ref.as_deref(),
            callback.amount.as_deref(),
            callback.currency.as_deref(),
            callback.signature.as_deref(),
        ) else {
            return SignatureCheck::Invalid;
        };

        let message = self.message(tran_ref, amount.trim(), currency.trim());
        if verify_hmac_sha256_hex(self.secret.as_bytes(), message.as_bytes(), signature) {
            SignatureCheck::Valid
        } else {
            SignatureCheck::Invalid
        }
    }
}
