//! Response envelope and money encoding shared by the ERP calls.

use orderbridge_domain::{CommerceError, Result};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

use super::errors::{ErpError, ErpErrorCategory};

/// Decode a reply of the `{code, message, ...}` shape.
///
/// Non-2xx statuses and 2xx replies with a non-zero `code` both fail,
/// carrying the ERP's message when there is one.
pub(crate) async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| CommerceError::from(ErpError::new(ErpErrorCategory::Unknown, e.to_string())))?;
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    let message = body.get("message").and_then(Value::as_str);
    if !status.is_success() {
        let detail = message.or_else(|| body.get("error").and_then(Value::as_str));
        return Err(ErpError::from_status(status, detail).into());
    }

    if let Some(code) = body.get("code").and_then(Value::as_i64) {
        if code != 0 {
            return Err(ErpError::from_result_code(code, message.unwrap_or(""), status).into());
        }
    }

    serde_json::from_value(body).map_err(|e| {
        ErpError::new(ErpErrorCategory::Unknown, format!("unexpected ERP reply: {e}"))
            .with_status(status.as_u16())
            .into()
    })
}

/// Major-unit decimal from the wire to integer cents, rounding half up at
/// the third decimal.
pub(crate) fn decimal_to_cents(value: &Number) -> Option<i64> {
    let text = value.to_string();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    if digits.contains(['e', 'E']) {
        return None;
    }

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut fraction_digits = fraction.chars().chain(std::iter::repeat('0'));
    let mut cents = 0i64;
    for _ in 0..2 {
        cents = cents * 10 + i64::from(fraction_digits.next()?.to_digit(10)?);
    }
    let round_up = fraction_digits.next().and_then(|c| c.to_digit(10)).is_some_and(|d| d >= 5);

    let magnitude = whole.checked_mul(100)?.checked_add(cents + i64::from(round_up))?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Integer cents to the decimal the ERP expects.
pub(crate) fn cents_to_decimal(cents: i64) -> Value {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let text = format!("{sign}{}.{:02}", abs / 100, abs % 100);
    serde_json::from_str::<Number>(&text).map_or(Value::Null, Value::Number)
}
