//! HTTP client layer: `KrakenHttp` with retry policies.

pub mod client;
pub mod retry;

pub use client::KrakenHttp;
pub use retry::{RetryConfig, RetryPolicy};
