//! Normalization of raw OHLC rows into [`Bar`]s.

use crate::domain::series::Bar;
use crate::shared::Orientation;
use serde_json::Value;

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then_some(n)
}

/// Parse one `[time, open, high, low, close, ...]` row.
///
/// Every field must be finite and strictly positive; anything else yields `None`.
pub fn normalize_row(row: &Value) -> Option<Bar> {
    let fields = row.as_array()?;
    if fields.len() < 5 {
        return None;
    }
    let time = number(&fields[0])?.floor() as i64;
    Bar::new(
        time,
        number(&fields[1])?,
        number(&fields[2])?,
        number(&fields[3])?,
        number(&fields[4])?,
    )
}

/// Normalize every row, dropping bad ones individually, and orient the result.
pub fn normalize_rows(rows: &[Value], orientation: Orientation) -> Vec<Bar> {
    let bars: Vec<Bar> = rows
        .iter()
        .filter_map(normalize_row)
        .map(|bar| bar.oriented(orientation))
        .collect();

    let dropped = rows.len() - bars.len();
    if dropped > 0 {
        tracing::debug!(dropped, kept = bars.len(), "Dropped malformed OHLC rows");
    }
    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_row_dropped() {
        let rows = vec![json!([1000, 1, 1.1, 0.9, 1.05]), json!(["bad"])];
        let bars = normalize_rows(&rows, Orientation::Direct);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].time, 1000);
        assert_eq!(bars[0].low, 0.9);
        assert_eq!(bars[0].high, 1.1);
        assert!(bars[0].low <= bars[0].high);
    }

    #[test]
    fn test_string_prices_and_extra_columns() {
        let row = json!([1700000000, "0.9180", "0.9190", "0.9170", "0.9185", "0.9181", "1200.5", 14]);
        let bar = normalize_row(&row).unwrap();
        assert_eq!(bar.open, 0.918);
        assert_eq!(bar.close, 0.9185);
    }

    #[test]
    fn test_rejects_non_positive_and_non_finite() {
        assert!(normalize_row(&json!([1000, 0, 1.1, 0.9, 1.05])).is_none());
        assert!(normalize_row(&json!([1000, "-1", 1.1, 0.9, 1.05])).is_none());
        assert!(normalize_row(&json!([1000, "inf", 1.1, 0.9, 1.05])).is_none());
        assert!(normalize_row(&json!([0, 1, 1.1, 0.9, 1.05])).is_none());
        assert!(normalize_row(&json!([1000, 1, 1.1, 0.9])).is_none());
        assert!(normalize_row(&json!({"time": 1000})).is_none());
    }

    #[test]
    fn test_inverted_rows_keep_invariant() {
        let rows = vec![json!([1000, 1.0, 1.25, 0.8, 1.0])];
        let bars = normalize_rows(&rows, Orientation::Inverted);
        assert_eq!(bars.len(), 1);
        assert!((bars[0].high - 1.25).abs() < 1e-12);
        assert!((bars[0].low - 0.8).abs() < 1e-12);
        assert!(bars[0].is_consistent());
    }
}
