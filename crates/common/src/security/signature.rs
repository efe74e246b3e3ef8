//! HMAC-SHA256 signing and constant-time verification.
//!
//! Signatures travel as lowercase hex. Verification decodes the hex and lets
//! `hmac` compare the MAC in constant time; malformed input simply fails
//! verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `message` keyed with `secret`.
#[must_use]
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature against the HMAC-SHA256 of `message`.
///
/// Hex case is ignored. The decoded bytes are compared by `Mac::verify_slice`
/// in constant time.
#[must_use]
pub fn verify_hmac_sha256_hex(secret: &[u8], message: &[u8], provided_hex: &str) -> bool {
    let Ok(provided) = hex::decode(provided_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&provided).is_ok()
}
