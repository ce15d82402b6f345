//! Network URL constants for the rate feed.

/// Default REST API base URL (public OHLC endpoint lives under `/0/public`).
pub const DEFAULT_API_URL: &str = "https://api.kraken.com";

/// Default WebSocket URL (ticker feed, protocol v1).
pub const DEFAULT_WS_URL: &str = "wss://ws.kraken.com";

/// Default tracked instrument. USDC/EUR stands in for USDC/EURC.
pub const DEFAULT_PAIR: &str = "USDC/EUR";
