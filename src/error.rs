//! Unified error types.

use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// HTTP-layer errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[cfg(feature = "http")]
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Timeout")]
    Timeout,

    /// The venue answered 2xx but its envelope carried an `error` array.
    #[error("API error: {0}")]
    Api(String),

    /// The envelope carried no usable rows.
    #[error("Empty payload: {0}")]
    EmptyPayload(String),

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// WebSocket errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WsError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed {
        code: Option<u16>,
        reason: String,
    },
}

/// Why an inbound frame did not produce a [`Quote`](crate::domain::quote::Quote).
///
/// These never escape the connection task: the frame is dropped and logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("Not a ticker frame")]
    NotTicker,

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Non-positive or non-finite {field}: {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("Frame from channel {got} does not match subscription")]
    ChannelMismatch { got: String },
}
