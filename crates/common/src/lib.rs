//! Cross-cutting utilities shared across orderbridge crates.
//!
//! - [`time`]: injectable wall clock ([`Clock`], [`SystemClock`], [`MockClock`])
//! - [`security`]: HMAC-SHA256 signing and verification

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod security;
pub mod time;

pub use security::{hmac_sha256_hex, verify_hmac_sha256_hex};
pub use time::{Clock, MockClock, SystemClock};
