//! Shared outbound HTTP client.

mod client;

pub use client::{HttpClient, HttpClientBuilder};
