//! Human-facing document numbers, e.g. `QT-20260301-004211`.
//!
//! Uniqueness is enforced by the store; callers retry on conflict.

use chrono::{DateTime, Utc};
use rand::Rng;

#[must_use]
pub fn document_number(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{prefix}-{}-{suffix:06}", now.format("%Y%m%d"))
}

/// Transaction reference correlating a payment session and its callbacks.
#[must_use]
pub fn transaction_ref(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::now_v7().simple())
}
