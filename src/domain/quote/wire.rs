//! Wire types for the ticker stream (inbound).
//!
//! The venue multiplexes two shapes on one socket:
//! - channel data as a JSON array `[channelId, payload, ("ticker",)? pair]`
//! - control messages as a JSON object carrying `event` and/or `error`

use crate::error::QuoteError;
use crate::shared::Pair;
use serde::Deserialize;
use serde_json::Value;

/// Ticker payload. Each level is an array whose first element is the price
/// (a numeric string on the real venue, a plain number is tolerated).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TickerPayload {
    /// Best bid `[price, wholeLotVolume, lotVolume]`.
    pub b: Vec<Value>,
    /// Best ask `[price, wholeLotVolume, lotVolume]`.
    pub a: Vec<Value>,
    /// Last trade closed `[price, lotVolume]`.
    pub c: Vec<Value>,
}

/// Control message (`subscriptionStatus`, `heartbeat`, `systemStatus`, errors).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ControlFrame {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "channelID")]
    pub channel_id: Option<i64>,
    #[serde(default)]
    pub pair: Option<Pair>,
    #[serde(default, rename = "errorMessage")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl ControlFrame {
    /// Explicit failure carried by this frame, if any.
    pub fn error_indicator(&self) -> Option<String> {
        let is_sub_error = self.event.as_deref() == Some("subscriptionStatus")
            && self.status.as_deref() == Some("error");
        let is_error_event = self.event.as_deref() == Some("error");

        if is_sub_error || is_error_event {
            return Some(
                self.error_message
                    .clone()
                    .unwrap_or_else(|| "unspecified error".to_string()),
            );
        }

        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::Array(items)) if items.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// Channel id granted by a successful subscription acknowledgement.
    pub fn subscribed_channel(&self) -> Option<i64> {
        if self.event.as_deref() == Some("subscriptionStatus")
            && self.status.as_deref() == Some("subscribed")
        {
            self.channel_id
        } else {
            None
        }
    }
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Ticker(TickerFrame),
    Control(ControlFrame),
}

/// Array-shaped channel data that carries a ticker payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerFrame {
    pub channel_id: Option<i64>,
    pub payload: TickerPayload,
    /// Channel name when the venue sends the 4-element form.
    pub channel_name: Option<String>,
    /// Trailing instrument label.
    pub pair_label: Option<String>,
}

impl InboundFrame {
    /// Classify a text frame. Anything that is neither a ticker array nor a
    /// control object is an error the caller drops.
    pub fn parse(text: &str) -> Result<Self, QuoteError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| QuoteError::Malformed(e.to_string()))?;

        match value {
            Value::Array(items) => parse_channel_array(items).map(InboundFrame::Ticker),
            obj @ Value::Object(_) => serde_json::from_value::<ControlFrame>(obj)
                .map(InboundFrame::Control)
                .map_err(|e| QuoteError::Malformed(e.to_string())),
            _ => Err(QuoteError::Malformed("expected array or object".into())),
        }
    }
}

fn parse_channel_array(mut items: Vec<Value>) -> Result<TickerFrame, QuoteError> {
    if items.len() < 3 {
        return Err(QuoteError::NotTicker);
    }

    let channel_id = items[0].as_i64();

    let payload_value = std::mem::take(&mut items[1]);
    if !payload_value.is_object() {
        return Err(QuoteError::NotTicker);
    }
    let payload: TickerPayload =
        serde_json::from_value(payload_value).map_err(|_| QuoteError::NotTicker)?;
    if payload.b.is_empty() || payload.a.is_empty() || payload.c.is_empty() {
        return Err(QuoteError::NotTicker);
    }

    let trailing: Vec<String> = items[2..]
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    let (channel_name, pair_label) = match trailing.as_slice() {
        [name, pair, ..] => (Some(name.clone()), Some(pair.clone())),
        [pair] => (None, Some(pair.clone())),
        [] => (None, None),
    };

    Ok(TickerFrame {
        channel_id,
        payload,
        channel_name,
        pair_label,
    })
}
