//! Display formatting for rates.
//!
//! FX rates hover around 1.0, so they are shown with a fixed number of
//! decimals rather than trimmed or thousands-separated.

/// Placeholder rendered when no value is available.
pub const PLACEHOLDER: &str = "—";

/// Decimals used for ticker rows and the chart headline.
pub const PRICE_DECIMALS: usize = 4;

/// Format a rate with a fixed number of decimals. Non-finite input renders the placeholder.
pub fn display_price(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }
    format!("{:.1$}", value, decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_price_fixed_decimals() {
        assert_eq!(display_price(1.08, PRICE_DECIMALS), "1.0800");
        assert_eq!(display_price(1.080249, 4), "1.0802");
        assert_eq!(display_price(0.92593, 2), "0.93");
    }

    #[test]
    fn test_display_price_non_finite() {
        assert_eq!(display_price(f64::NAN, 4), PLACEHOLDER);
        assert_eq!(display_price(f64::INFINITY, 4), PLACEHOLDER);
    }
}
