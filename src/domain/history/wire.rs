//! Wire types for the public OHLC endpoint.

use crate::error::HttpError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Success/error envelope: `{"error": [...], "result": {"<PAIR>": [rows], "last": n}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OhlcEnvelope {
    #[serde(default)]
    pub error: Vec<String>,
    #[serde(default)]
    pub result: Option<OhlcResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OhlcResult {
    /// Cursor for the next incremental request.
    #[serde(default)]
    pub last: Option<Value>,
    /// Row arrays keyed by the venue's pair name.
    #[serde(flatten)]
    pub series: HashMap<String, Value>,
}

/// Raw rows pulled out of an envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OhlcRows {
    pub rows: Vec<Value>,
    pub last: Option<i64>,
}

impl OhlcEnvelope {
    /// Unwrap the row array, preferring the entry keyed by `pair_key`.
    ///
    /// A non-empty `error` array, a missing `result`, or zero rows are all errors.
    pub fn into_rows(self, pair_key: &str) -> Result<OhlcRows, HttpError> {
        if !self.error.is_empty() {
            return Err(HttpError::Api(self.error.join("; ")));
        }

        let mut result = self
            .result
            .ok_or_else(|| HttpError::EmptyPayload("missing result".into()))?;

        let last = result.last.as_ref().and_then(Value::as_i64);

        let rows = match result.series.remove(pair_key) {
            Some(Value::Array(rows)) => rows,
            _ => result
                .series
                .into_values()
                .find_map(|v| match v {
                    Value::Array(rows) => Some(rows),
                    _ => None,
                })
                .unwrap_or_default(),
        };

        if rows.is_empty() {
            return Err(HttpError::EmptyPayload(format!("no rows for {}", pair_key)));
        }

        Ok(OhlcRows { rows, last })
    }
}
