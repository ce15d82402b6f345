//! History sub-client: timeframe-driven OHLC fetches with a short-lived cache.

use super::convert::normalize_rows;
use super::HistoryRequest;
use crate::client::RateFeedClient;
use crate::domain::series::Bar;
use crate::error::{FeedError, HttpError};
use crate::shared::{Orientation, Pair, Timeframe};
use std::time::Instant;

/// Sub-client for historical bars.
pub struct HistoryFetcher<'a> {
    pub(crate) client: &'a RateFeedClient,
}

impl<'a> HistoryFetcher<'a> {
    /// Fetch a normalized window of bars for `timeframe`, oriented for display.
    ///
    /// Malformed rows are dropped individually. An error envelope, a non-2xx
    /// response, or a payload with no usable rows is an error.
    pub async fn fetch(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        orientation: Orientation,
    ) -> Result<Vec<Bar>, FeedError> {
        let request = HistoryRequest::plan(pair, timeframe, chrono::Utc::now().timestamp());
        let bars = self.fetch_direct(&request).await?;
        Ok(bars.into_iter().map(|b| b.oriented(orientation)).collect())
    }

    /// Execute a planned request, bypassing nothing but honouring the cache.
    pub async fn fetch_direct(&self, request: &HistoryRequest) -> Result<Vec<Bar>, FeedError> {
        let key = (request.pair.clone(), request.timeframe);

        {
            let cache = self.client.history_cache.read().await;
            if let Some((bars, fetched_at)) = cache.get(&key) {
                if fetched_at.elapsed() < self.client.history_cache_ttl {
                    tracing::debug!(pair = %request.pair, timeframe = %request.timeframe, "History cache hit");
                    return Ok(bars.clone());
                }
            }
        }

        let envelope = self
            .client
            .http
            .get_ohlc(&request.pair.rest_name(), request.interval, request.since)
            .await?;
        let rows = envelope.into_rows(&request.pair.rest_name())?;
        let bars = normalize_rows(&rows.rows, Orientation::Direct);

        if bars.is_empty() {
            return Err(HttpError::EmptyPayload(format!(
                "all {} rows malformed",
                rows.rows.len()
            ))
            .into());
        }

        tracing::info!(
            pair = %request.pair,
            timeframe = %request.timeframe,
            interval = %request.interval,
            bars = bars.len(),
            "Fetched history"
        );

        self.client
            .history_cache
            .write()
            .await
            .insert(key, (bars.clone(), Instant::now()));

        Ok(bars)
    }
}
