//! Subscription parameters.

use crate::shared::Pair;
use serde::{Deserialize, Serialize};

/// Channel carrying best bid/ask/last.
pub const TICKER: &str = "ticker";

/// Channel descriptor inside a subscribe/unsubscribe request.
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub struct ChannelSpec {
    pub name: String,
}

/// Body of a subscribe/unsubscribe request.
///
/// Wire format: `{"pair": ["USDC/EUR"], "subscription": {"name": "ticker"}}`,
/// flattened next to the `event` tag of [`MessageOut`](super::MessageOut).
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub struct SubscribeParams {
    pub pair: Vec<Pair>,
    pub subscription: ChannelSpec,
}

impl SubscribeParams {
    pub fn ticker(pair: &Pair) -> Self {
        Self {
            pair: vec![pair.clone()],
            subscription: ChannelSpec {
                name: TICKER.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_params_serialization() {
        let params = SubscribeParams::ticker(&Pair::from("USDC/EUR"));
        let parsed = serde_json::to_value(&params).unwrap();
        assert_eq!(parsed["pair"][0], "USDC/EUR");
        assert_eq!(parsed["subscription"]["name"], "ticker");
    }
}
