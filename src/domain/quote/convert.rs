//! Conversions from ticker wire frames to [`Quote`].

use super::wire::{TickerFrame, TickerPayload};
use super::Quote;
use crate::error::QuoteError;
use crate::shared::Pair;
use chrono::{DateTime, Utc};
use serde_json::Value;

const TICKER_CHANNEL: &str = "ticker";

/// Price from a book level: first element, numeric string or number.
pub fn level_price(level: &[Value]) -> Option<f64> {
    match level.first()? {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

impl TickerPayload {
    pub fn to_quote(&self, observed_at: DateTime<Utc>) -> Result<Quote, QuoteError> {
        let bid = level_price(&self.b).ok_or_else(|| QuoteError::Malformed("bid".into()))?;
        let ask = level_price(&self.a).ok_or_else(|| QuoteError::Malformed("ask".into()))?;
        let last = level_price(&self.c).ok_or_else(|| QuoteError::Malformed("last".into()))?;
        Quote::new(bid, ask, last, observed_at)
    }
}

impl TickerFrame {
    /// Whether this frame originates from the current subscription.
    ///
    /// `channel_id` is the id granted by the subscription acknowledgement, when
    /// one has been seen on this connection.
    pub fn check_origin(&self, pair: &Pair, channel_id: Option<i64>) -> Result<(), QuoteError> {
        if let (Some(expected), Some(got)) = (channel_id, self.channel_id) {
            if expected != got {
                return Err(QuoteError::ChannelMismatch {
                    got: got.to_string(),
                });
            }
        }

        if let Some(name) = &self.channel_name {
            if !name.starts_with(TICKER_CHANNEL) {
                return Err(QuoteError::ChannelMismatch { got: name.clone() });
            }
        }

        if let Some(label) = &self.pair_label {
            if label != pair.as_str() && label != TICKER_CHANNEL {
                return Err(QuoteError::ChannelMismatch { got: label.clone() });
            }
        }

        Ok(())
    }

    /// Validate origin, then parse prices.
    pub fn to_quote(
        &self,
        pair: &Pair,
        channel_id: Option<i64>,
        observed_at: DateTime<Utc>,
    ) -> Result<Quote, QuoteError> {
        self.check_origin(pair, channel_id)?;
        self.payload.to_quote(observed_at)
    }
}
