//! High-level client: `RateFeedClient` with nested sub-client accessors.
//!
//! History has its sub-client in `domain/history/client.rs`. This module keeps
//! the builder, shared cache state, and accessor methods.

use crate::domain::history::client::HistoryFetcher;
use crate::domain::series::Bar;
use crate::error::FeedError;
use crate::http::{KrakenHttp, RetryPolicy};
use crate::shared::{Pair, Timeframe};
use crate::ws::WsConfig;

use async_lock::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Re-export sub-client types for convenience.
pub use crate::domain::history::client::HistoryFetcher as HistoryClient;

/// History cache: (pair, timeframe) → (direct-orientation bars, fetched_at)
pub(crate) type HistoryCache = Arc<RwLock<HashMap<(Pair, Timeframe), (Vec<Bar>, Instant)>>>;

/// The primary entry point.
///
/// `client.history()` fetches OHLC windows; `client.quote_connection()` and
/// `client.chart_feed(..)` create live components from the configured endpoints.
pub struct RateFeedClient {
    pub(crate) http: KrakenHttp,
    pub(crate) ws_config: WsConfig,
    pub(crate) history_cache: HistoryCache,
    /// Cache TTL for history windows
    pub(crate) history_cache_ttl: Duration,
}

impl RateFeedClient {
    pub fn builder() -> RateFeedClientBuilder {
        RateFeedClientBuilder::default()
    }

    // ── Sub-client accessors ─────────────────────────────────────────────

    pub fn history(&self) -> HistoryFetcher<'_> {
        HistoryFetcher { client: self }
    }

    /// The configured pair.
    pub fn pair(&self) -> &Pair {
        &self.ws_config.pair
    }

    /// WS config for creating a quote connection.
    ///
    /// Connections are not embedded in the client: their lifetime belongs to
    /// whatever displays the feed.
    pub fn ws_config(&self) -> &WsConfig {
        &self.ws_config
    }

    /// A new, unstarted quote connection from the current config.
    #[cfg(feature = "ws-native")]
    pub fn quote_connection(&self) -> crate::ws::native::QuoteConnection {
        crate::ws::native::QuoteConnection::new(self.ws_config.clone())
    }

    /// Start a chart feed: live quotes plus periodic history.
    #[cfg(feature = "ws-native")]
    pub fn chart_feed(&self, config: crate::feed::FeedConfig) -> crate::feed::ChartFeed {
        crate::feed::ChartFeed::spawn(self.clone(), config)
    }

    /// Clear all HTTP caches.
    pub async fn clear_all_caches(&self) {
        self.history_cache.write().await.clear();
    }
}

impl Clone for RateFeedClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            ws_config: self.ws_config.clone(),
            history_cache: self.history_cache.clone(),
            history_cache_ttl: self.history_cache_ttl,
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct RateFeedClientBuilder {
    api_url: String,
    ws_url: String,
    pair: Pair,
    history_cache_ttl: Duration,
    reconnect_delay: Duration,
    retry: RetryPolicy,
}

impl Default for RateFeedClientBuilder {
    fn default() -> Self {
        Self {
            api_url: crate::network::DEFAULT_API_URL.to_string(),
            ws_url: crate::network::DEFAULT_WS_URL.to_string(),
            pair: Pair::default(),
            history_cache_ttl: Duration::from_secs(30),
            reconnect_delay: Duration::from_millis(WsConfig::default().reconnect_delay_ms),
            retry: RetryPolicy::default(),
        }
    }
}

impl RateFeedClientBuilder {
    pub fn api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }

    pub fn ws_url(mut self, url: &str) -> Self {
        self.ws_url = url.to_string();
        self
    }

    /// Venue pair name, e.g. `USDC/EUR`.
    pub fn pair(mut self, pair: impl Into<Pair>) -> Self {
        self.pair = pair.into();
        self
    }

    pub fn history_cache_ttl(mut self, ttl: Duration) -> Self {
        self.history_cache_ttl = ttl;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn build(self) -> Result<RateFeedClient, FeedError> {
        if !self.pair.as_str().contains('/') {
            return Err(FeedError::Validation(format!(
                "pair must be BASE/QUOTE, got {}",
                self.pair
            )));
        }

        Ok(RateFeedClient {
            http: KrakenHttp::with_retry(&self.api_url, self.retry),
            ws_config: WsConfig {
                url: self.ws_url,
                pair: self.pair,
                reconnect_delay_ms: self.reconnect_delay.as_millis() as u64,
                ..WsConfig::default()
            },
            history_cache: Arc::new(RwLock::new(HashMap::new())),
            history_cache_ttl: self.history_cache_ttl,
        })
    }
}
