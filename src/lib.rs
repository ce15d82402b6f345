//! # ratefeed
//!
//! Live FX rate charts: a streaming ticker and periodic OHLC history merged
//! into line and candle series, with orientation inversion and timeframe
//! windowing.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: Shared types, domain models, the series aggregator and views (no I/O)
//! 2. **HTTP API**: `KrakenHttp` with retry policies
//! 3. **WebSocket**: Pure protocol machine + `tokio-tungstenite` quote connection
//! 4. **High-Level Client**: `RateFeedClient` with the history sub-client and caching
//! 5. **Feed**: `ChartFeed`, the single-writer driver publishing `ChartView`s
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ratefeed::prelude::*;
//!
//! let client = RateFeedClient::builder().pair("USDC/EUR").build()?;
//!
//! let bars = client.history().fetch(client.pair(), Timeframe::Day1, Orientation::Direct).await?;
//!
//! let mut feed = client.chart_feed(FeedConfig::default());
//! feed.set_selection(TimeframeSelection::new(Orientation::Inverted, Timeframe::Week1, ChartKind::Candle))?;
//! let view = feed.view();
//! feed.shutdown().await;
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes used across all domains.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, state.
pub mod domain;

/// Unified error types.
pub mod error;

/// Network URL constants.
pub mod network;

// ── Layer 2: HTTP API ────────────────────────────────────────────────────────

/// HTTP client with retry policies.
#[cfg(feature = "http")]
pub mod http;

// ── Layer 3: WebSocket ───────────────────────────────────────────────────────

/// WebSocket: frames, connection state machine, quote connection.
pub mod ws;

// ── Layer 4: High-Level Client ───────────────────────────────────────────────

/// `RateFeedClient`: the primary entry point.
#[cfg(feature = "http")]
pub mod client;

// ── Layer 5: Feed ────────────────────────────────────────────────────────────

/// `ChartFeed`: live quotes and history merged into published views.
#[cfg(all(feature = "http", feature = "ws-native"))]
pub mod feed;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{
        ChartKind, Interval, Orientation, Pair, PriceField, Timeframe, TimeframeSelection,
    };

    // Domain types
    pub use crate::domain::history::HistoryRequest;
    pub use crate::domain::quote::Quote;
    pub use crate::domain::series::{
        AggregatorConfig, Bar, FoldOutcome, LinePoint, SeriesAggregator, SeriesSnapshot,
    };
    pub use crate::domain::view::{ChartView, HistoryStatus, TimeframeView};

    // Errors
    pub use crate::error::{FeedError, HttpError, QuoteError, WsError};

    // Network
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_PAIR, DEFAULT_WS_URL};

    // HTTP client + sub-clients
    #[cfg(feature = "http")]
    pub use crate::client::{HistoryClient, RateFeedClient, RateFeedClientBuilder};
    #[cfg(feature = "http")]
    pub use crate::http::retry::{RetryConfig, RetryPolicy};

    // WebSocket types
    pub use crate::ws::{ConnectionMachine, ConnectionState, MessageOut, WsConfig, WsEvent};
    #[cfg(feature = "ws-native")]
    pub use crate::ws::native::{QuoteConnection, QuoteEvents};

    // Feed
    #[cfg(all(feature = "http", feature = "ws-native"))]
    pub use crate::feed::{ChartFeed, FeedConfig};
}
