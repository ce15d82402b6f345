//! Quote domain: one parsed priced update from the ticker stream.

pub mod convert;
pub mod wire;

use crate::error::QuoteError;
use crate::shared::fmt::{display_price, PRICE_DECIMALS};
use crate::shared::{Orientation, PriceField};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Best bid/ask and last trade for the tracked pair at one instant.
///
/// Constructed only through [`Quote::new`], which guarantees every price is
/// finite and strictly positive and that `mid == (bid + ask) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quote {
    bid: f64,
    ask: f64,
    last: f64,
    mid: f64,
    observed_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(bid: f64, ask: f64, last: f64, observed_at: DateTime<Utc>) -> Result<Self, QuoteError> {
        check_positive("bid", bid)?;
        check_positive("ask", ask)?;
        check_positive("last", last)?;
        Ok(Self {
            bid,
            ask,
            last,
            mid: (bid + ask) / 2.0,
            observed_at,
        })
    }

    pub fn bid(&self) -> f64 {
        self.bid
    }

    pub fn ask(&self) -> f64 {
        self.ask
    }

    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn mid(&self) -> f64 {
        self.mid
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Unix seconds of observation.
    pub fn timestamp(&self) -> i64 {
        self.observed_at.timestamp()
    }

    /// Raw feed price for the requested field.
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Last => self.last,
            PriceField::Mid => self.mid,
            PriceField::Bid => self.bid,
            PriceField::Ask => self.ask,
        }
    }

    /// Price for display in the given orientation.
    pub fn display_price(&self, field: PriceField, orientation: Orientation) -> f64 {
        orientation.apply(self.price(field))
    }
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bid {} ask {} mid {} last {}",
            display_price(self.bid, PRICE_DECIMALS),
            display_price(self.ask, PRICE_DECIMALS),
            display_price(self.mid, PRICE_DECIMALS),
            display_price(self.last, PRICE_DECIMALS),
        )
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), QuoteError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(QuoteError::NonPositive { field, value })
    }
}
