//! Normalising gateway callbacks.
//!
//! The webhook (form body) and the browser return (query string) deliver
//! the same facts under different field names; the first non-empty
//! candidate wins.

use orderbridge_domain::NormalizedCallback;

const TRAN_REF: &[&str] = &["tranRef", "tran_ref", "transaction_ref", "tranref"];
const ORDER_REF: &[&str] = &["orderId", "order_id", "cartId", "cart_id"];
const STATUS: &[&str] =
    &["respStatus", "resp_status", "response_status", "payment_result[response_status]", "status"];
const MESSAGE: &[&str] = &["respMessage", "resp_message", "response_message"];
const AMOUNT: &[&str] = &["cart_amount", "amount", "tran_total"];
const CURRENCY: &[&str] = &["cart_currency", "currency", "tran_currency"];
const PAYMENT_ID: &[&str] = &["payment_id", "paymentId", "transaction_id", "tran_id"];
const SIGNATURE: &[&str] = &["signature", "hash", "secure_hash"];

/// Build a [`NormalizedCallback`] from decoded form or query pairs.
pub fn parse_callback<K, V>(pairs: &[(K, V)]) -> NormalizedCallback
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let pick = |names: &[&str]| {
        names.iter().find_map(|name| {
            pairs
                .iter()
                .find(|(key, value)| key.as_ref() == *name && !value.as_ref().trim().is_empty())
                .map(|(_, value)| value.as_ref().trim().to_owned())
        })
    };

    NormalizedCallback {
        tran_ref: pick(TRAN_REF),
        order_ref: pick(ORDER_REF),
        status_code: pick(STATUS),
        message: pick(MESSAGE),
        amount: pick(AMOUNT),
        currency: pick(CURRENCY),
        payment_id: pick(PAYMENT_ID),
        signature: pick(SIGNATURE),
    }
}
