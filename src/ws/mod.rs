//! WebSocket layer: frames, connection state, events.
//!
//! - `machine` is the transport-free protocol state machine
//! - `native` drives it over `tokio-tungstenite` (`ws-native` feature)
//!
//! This module defines the shared message/event types.

pub mod machine;
pub mod subscriptions;

#[cfg(feature = "ws-native")]
pub mod native;

use crate::domain::quote::Quote;
use crate::error::WsError;
use crate::shared::Pair;
use serde::{Deserialize, Serialize};

pub use machine::{AfterClose, ConnectionMachine, FrameOutcome};
pub use subscriptions::{ChannelSpec, SubscribeParams};

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum MessageOut {
    Subscribe(SubscribeParams),
    Unsubscribe(SubscribeParams),
}

impl MessageOut {
    pub fn subscribe_ticker(pair: &Pair) -> Self {
        Self::Subscribe(SubscribeParams::ticker(pair))
    }

    pub fn unsubscribe_ticker(pair: &Pair) -> Self {
        Self::Unsubscribe(SubscribeParams::ticker(pair))
    }
}

impl std::fmt::Display for MessageOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

// ─── Connection state ────────────────────────────────────────────────────────

/// Health of the quote stream.
///
/// `Connected` means the transport is open but no priced frame has arrived
/// since the current attempt began; `Live` means at least one has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    Live = 3,
    Disconnected = 4,
    Error = 5,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Live => "live",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }

    /// Transport is being opened or is open.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Live)
    }
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Live,
            4 => Self::Disconnected,
            5 => Self::Error,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── WsEvent ─────────────────────────────────────────────────────────────────

/// Events emitted by the quote connection to its single consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    /// A validated quote, tagged with the pair subscribed when it arrived.
    Quote { pair: Pair, quote: Quote },
    /// The connection state changed.
    State(ConnectionState),
    /// A failed attempt, a close, or an error frame. Never fatal.
    Error(WsError),
}

/// Configuration for the quote connection.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    pub pair: Pair,
    /// Schedule a reconnect after every close. Off only in tests.
    pub reconnect: bool,
    /// Fixed delay between a close and the next attempt.
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub event_channel_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: crate::network::DEFAULT_WS_URL.to_string(),
            pair: Pair::default(),
            reconnect: true,
            reconnect_delay_ms: 3000,
            connect_timeout_ms: 30_000,
            event_channel_capacity: 256,
        }
    }
}
