//! Decoding and authenticating ERP webhook deliveries.

use orderbridge_common::verify_hmac_sha256_hex;
use orderbridge_domain::{CommerceError, ErpEvent, Result, SignatureCheck};
use serde::Deserialize;
use serde_json::Value;

use super::client::ItemRecord;

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const ERP_SIGNATURE_HEADER: &str = "x-erp-signature";

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    organization_id: Option<Value>,
    #[serde(default)]
    data: Value,
}

/// Check `signature` against the raw body. Without a configured secret
/// nothing can be checked.
pub fn verify_erp_signature(
    secret: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
) -> SignatureCheck {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return SignatureCheck::NotConfigured;
    };
    match signature {
        Some(sig) if verify_hmac_sha256_hex(secret.as_bytes(), body, sig) => SignatureCheck::Valid,
        _ => SignatureCheck::Invalid,
    }
}

/// Decode a `{event, organization_id?, data}` delivery.
pub fn parse_erp_event(body: &[u8]) -> Result<ErpEvent> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| CommerceError::Validation(format!("malformed ERP webhook: {e}")))?;

    // some deliveries send the tenant as a number
    let tenant_id = envelope.organization_id.and_then(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let event_type = envelope.event.trim().to_ascii_lowercase();

    match event_type.as_str() {
        "item.created" | "item.updated" => {
            let record = nested(envelope.data, "item");
            let item: ItemRecord = serde_json::from_value(record).map_err(|e| {
                CommerceError::Validation(format!("ERP item payload is invalid: {e}"))
            })?;
            Ok(ErpEvent::ItemUpserted { tenant_id, item: item.into_item() })
        }
        "item.deleted" => {
            let item_id = string_field(&nested(envelope.data, "item"), "item_id")?;
            Ok(ErpEvent::ItemDeleted { tenant_id, item_id })
        }
        "invoice.paid" | "invoice.void" | "invoice.sent" | "invoice.overdue" => {
            let invoice_id = string_field(&nested(envelope.data, "invoice"), "invoice_id")?;
            let status = event_type.trim_start_matches("invoice.").to_string();
            Ok(ErpEvent::InvoiceStatusChanged { tenant_id, invoice_id, status })
        }
        _ => Ok(ErpEvent::Unhandled { event_type }),
    }
}

/// `data.item` when wrapped, otherwise `data` itself.
fn nested(mut data: Value, key: &str) -> Value {
    match data.get_mut(key) {
        Some(inner) if inner.is_object() => inner.take(),
        _ => data,
    }
}

fn string_field(value: &Value, key: &str) -> Result<String> {
    match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(CommerceError::Validation(format!("ERP webhook is missing {key}"))),
    }
}
